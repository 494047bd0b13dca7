use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use souq_db::models::UserRow;
use souq_db::queries::users::{CreatorFilter, ProfilePatch};
use souq_types::api::{Claims, UpdateProfileRequest, UserResponse};
use souq_types::models::UserType;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

/// Convert a DB row into the public user shape, decoding the JSON
/// platforms column.
pub(crate) fn to_user_response(row: UserRow) -> ApiResult<UserResponse> {
    let id: Uuid = row
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", row.id, e))?;
    let user_type: UserType = row.user_type.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let platforms: Vec<String> = serde_json::from_str(&row.platforms).unwrap_or_default();

    Ok(UserResponse {
        id,
        email: row.email,
        full_name: row.full_name,
        user_type,
        email_verified: row.email_verified,
        bio: row.bio,
        location: row.location,
        niche: row.niche,
        platforms,
        followers: row.followers,
        price_min: row.price_min,
        price_max: row.price_max,
        avatar_url: row.avatar_url,
        created_at: row.created_at,
    })
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = blocking(move || {
        state
            .db
            .get_user_by_id(&claims.sub.to_string())?
            .ok_or(ApiError::NotFound("User"))
    })
    .await?;
    Ok(Json(to_user_response(user)?))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(name) = &req.full_name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("Full name cannot be empty".into()));
        }
    }
    if let (Some(min), Some(max)) = (req.price_min, req.price_max) {
        if min > max {
            return Err(ApiError::Validation("price_min cannot exceed price_max".into()));
        }
    }

    let platforms = match &req.platforms {
        Some(platforms) => Some(
            serde_json::to_string(platforms)
                .map_err(|e| anyhow::anyhow!("platforms encoding failed: {}", e))?,
        ),
        None => None,
    };

    let user = blocking(move || {
        let id = claims.sub.to_string();
        state.db.update_profile(
            &id,
            &ProfilePatch {
                full_name: req.full_name,
                bio: req.bio,
                location: req.location,
                niche: req.niche,
                platforms,
                followers: req.followers,
                price_min: req.price_min,
                price_max: req.price_max,
                avatar_url: req.avatar_url,
            },
        )?;

        state.db.get_user_by_id(&id)?.ok_or(ApiError::NotFound("User"))
    })
    .await?;
    Ok(Json(to_user_response(user)?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = blocking(move || {
        let user = state
            .db
            .get_user_by_id(&id.to_string())?
            .ok_or(ApiError::NotFound("User"))?;
        if !user.is_active {
            return Err(ApiError::NotFound("User"));
        }
        Ok(user)
    })
    .await?;
    Ok(Json(to_user_response(user)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatorsQuery {
    pub q: Option<String>,
    pub niche: Option<String>,
    pub platform: Option<String>,
    pub min_followers: Option<i64>,
    pub max_price: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Public creator directory. Only active, verified creator accounts.
pub async fn list_creators(
    State(state): State<AppState>,
    Query(query): Query<CreatorsQuery>,
) -> ApiResult<impl IntoResponse> {
    let rows = blocking(move || {
        Ok(state.db.search_creators(&CreatorFilter {
            q: query.q,
            niche: query.niche,
            platform: query.platform,
            min_followers: query.min_followers,
            max_price: query.max_price,
            limit: query.limit.unwrap_or(20).min(50),
            offset: query.offset.unwrap_or(0),
        })?)
    })
    .await?;

    let creators: Vec<UserResponse> = rows
        .into_iter()
        .map(to_user_response)
        .collect::<ApiResult<_>>()?;
    Ok(Json(creators))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use souq_db::queries::users::NewUser;

    fn claims_for(id: Uuid, user_type: UserType) -> Claims {
        Claims {
            sub: id,
            email: "x@example.com".into(),
            name: "X".into(),
            user_type,
            exp: usize::MAX,
        }
    }

    #[tokio::test]
    async fn profile_update_round_trips_platforms() {
        let state = test_state();
        let id = Uuid::new_v4();
        state
            .db
            .create_user(&NewUser {
                id: &id.to_string(),
                email: "c@example.com",
                password_hash: Some("hash"),
                full_name: "Creator",
                user_type: "creator",
                email_verified: true,
            })
            .unwrap();

        update_me(
            State(state.clone()),
            Extension(claims_for(id, UserType::Creator)),
            Json(UpdateProfileRequest {
                platforms: Some(vec!["instagram".into(), "tiktok".into()]),
                niche: Some("modest fashion".into()),
                ..Default::default()
            }),
        )
        .await
        .expect("update should succeed");

        let row = state.db.get_user_by_id(&id.to_string()).unwrap().unwrap();
        let platforms: Vec<String> = serde_json::from_str(&row.platforms).unwrap();
        assert_eq!(platforms, vec!["instagram", "tiktok"]);
    }

    #[tokio::test]
    async fn inverted_price_range_is_rejected() {
        let state = test_state();
        let id = Uuid::new_v4();
        state
            .db
            .create_user(&NewUser {
                id: &id.to_string(),
                email: "c@example.com",
                password_hash: Some("hash"),
                full_name: "Creator",
                user_type: "creator",
                email_verified: true,
            })
            .unwrap();

        let err = update_me(
            State(state.clone()),
            Extension(claims_for(id, UserType::Creator)),
            Json(UpdateProfileRequest {
                price_min: Some(900),
                price_max: Some(100),
                ..Default::default()
            }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
