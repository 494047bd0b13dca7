use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use souq_db::models::{PackageRow, PortfolioItemRow};
use souq_db::queries::portfolio::NewPackage;
use souq_types::api::{
    Claims, PackageResponse, PortfolioItemRequest, PortfolioItemResponse, ReplacePackagesRequest,
};
use souq_types::models::UserType;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

const MAX_PACKAGES: usize = 10;

fn to_item_response(row: PortfolioItemRow) -> ApiResult<PortfolioItemResponse> {
    Ok(PortfolioItemResponse {
        id: row.id.parse().map_err(|e| anyhow::anyhow!("corrupt item id: {}", e))?,
        creator_id: row
            .creator_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt creator id: {}", e))?,
        title: row.title,
        description: row.description,
        media_url: row.media_url,
        created_at: row.created_at,
    })
}

fn to_package_response(row: PackageRow) -> ApiResult<PackageResponse> {
    Ok(PackageResponse {
        id: row.id.parse().map_err(|e| anyhow::anyhow!("corrupt package id: {}", e))?,
        creator_id: row
            .creator_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt creator id: {}", e))?,
        title: row.title,
        description: row.description,
        price: row.price,
        deliverables: serde_json::from_str(&row.deliverables).unwrap_or_default(),
        created_at: row.created_at,
    })
}

fn require_creator(claims: &Claims) -> ApiResult<()> {
    if claims.user_type == UserType::Creator {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only creators have a portfolio"))
    }
}

fn validate_item(req: &PortfolioItemRequest) -> ApiResult<()> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }
    Ok(())
}

// -- Portfolio items --

pub async fn create_portfolio_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PortfolioItemRequest>,
) -> ApiResult<impl IntoResponse> {
    require_creator(&claims)?;
    validate_item(&req)?;

    let id = Uuid::new_v4();
    let item = blocking(move || {
        state.db.create_portfolio_item(
            &id.to_string(),
            &claims.sub.to_string(),
            req.title.trim(),
            req.description.as_deref(),
            req.media_url.as_deref(),
        )?;

        state
            .db
            .get_portfolio_item(&id.to_string())?
            .ok_or_else(|| anyhow::anyhow!("portfolio item vanished after insert").into())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(to_item_response(item)?)))
}

/// GET /users/{id}/portfolio — public.
pub async fn list_portfolio(
    State(state): State<AppState>,
    Path(creator_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let rows =
        blocking(move || Ok(state.db.list_portfolio_items(&creator_id.to_string())?)).await?;
    let items: Vec<PortfolioItemResponse> =
        rows.into_iter().map(to_item_response).collect::<ApiResult<_>>()?;
    Ok(Json(items))
}

pub async fn update_portfolio_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<PortfolioItemRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_item(&req)?;
    let item = blocking(move || {
        let item = state
            .db
            .get_portfolio_item(&id.to_string())?
            .ok_or(ApiError::NotFound("Portfolio item"))?;
        if item.creator_id != claims.sub.to_string() {
            return Err(ApiError::Forbidden("Not your portfolio item"));
        }

        state.db.update_portfolio_item(
            &id.to_string(),
            req.title.trim(),
            req.description.as_deref(),
            req.media_url.as_deref(),
        )?;

        state
            .db
            .get_portfolio_item(&id.to_string())?
            .ok_or(ApiError::NotFound("Portfolio item"))
    })
    .await?;
    Ok(Json(to_item_response(item)?))
}

pub async fn delete_portfolio_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    blocking(move || {
        let item = state
            .db
            .get_portfolio_item(&id.to_string())?
            .ok_or(ApiError::NotFound("Portfolio item"))?;
        if item.creator_id != claims.sub.to_string() {
            return Err(ApiError::Forbidden("Not your portfolio item"));
        }

        Ok(state.db.delete_portfolio_item(&id.to_string())?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Packages --

/// GET /users/{id}/packages — public, cheapest first.
pub async fn list_packages(
    State(state): State<AppState>,
    Path(creator_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let rows = blocking(move || Ok(state.db.list_packages(&creator_id.to_string())?)).await?;
    let packages: Vec<PackageResponse> =
        rows.into_iter().map(to_package_response).collect::<ApiResult<_>>()?;
    Ok(Json(packages))
}

/// PUT /me/packages — replace the whole list atomically. Partial
/// failures leave the old list in place.
pub async fn replace_packages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReplacePackagesRequest>,
) -> ApiResult<impl IntoResponse> {
    require_creator(&claims)?;
    if req.packages.len() > MAX_PACKAGES {
        return Err(ApiError::Validation(format!("At most {MAX_PACKAGES} packages allowed")));
    }
    for package in &req.packages {
        if package.title.trim().is_empty() {
            return Err(ApiError::Validation("Package titles are required".into()));
        }
        if package.price < 0 {
            return Err(ApiError::Validation("Package price cannot be negative".into()));
        }
    }

    let packages: Vec<NewPackage> = req
        .packages
        .into_iter()
        .map(|p| {
            Ok(NewPackage {
                id: Uuid::new_v4().to_string(),
                title: p.title.trim().to_string(),
                description: p.description,
                price: p.price,
                deliverables: serde_json::to_string(&p.deliverables)
                    .map_err(|e| anyhow::anyhow!("deliverables encoding failed: {}", e))?,
            })
        })
        .collect::<ApiResult<_>>()?;

    let rows = blocking(move || {
        let creator_id = claims.sub.to_string();
        state.db.replace_packages(&creator_id, &packages)?;
        Ok(state.db.list_packages(&creator_id)?)
    })
    .await?;
    let packages: Vec<PackageResponse> =
        rows.into_iter().map(to_package_response).collect::<ApiResult<_>>()?;
    Ok(Json(packages))
}
