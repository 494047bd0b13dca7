use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use souq_types::api::{AdminStats, ChangeCampaignStatusRequest, Claims, UserResponse};
use souq_types::models::{CampaignStatus, UserType};

use crate::campaigns::to_campaign_response;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};
use crate::users::to_user_response;

fn require_admin(claims: &Claims) -> ApiResult<()> {
    if claims.user_type == UserType::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin only"))
    }
}

/// GET /admin/stats — platform totals.
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&claims)?;

    let body = blocking(move || {
        let (volume, count) = state.db.transaction_totals()?;
        Ok(AdminStats {
            users_by_type: crate::dashboard::to_status_counts(state.db.count_users_by_type()?),
            campaigns_by_status: crate::dashboard::to_status_counts(
                state.db.count_campaigns_by_status(None)?,
            ),
            transaction_volume: volume,
            transaction_count: count,
        })
    })
    .await?;
    Ok(Json(body))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminUsersQuery {
    pub user_type: Option<UserType>,
    pub q: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AdminUsersQuery>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&claims)?;

    let rows = blocking(move || {
        let user_type = query.user_type.map(|t| t.as_str());
        Ok(state.db.list_users(user_type, query.q.as_deref())?)
    })
    .await?;
    let users: Vec<UserResponse> =
        rows.into_iter().map(to_user_response).collect::<ApiResult<_>>()?;
    Ok(Json(users))
}

async fn set_active(state: AppState, claims: Claims, id: Uuid, active: bool) -> ApiResult<()> {
    require_admin(&claims)?;
    blocking(move || {
        state
            .db
            .get_user_by_id(&id.to_string())?
            .ok_or(ApiError::NotFound("User"))?;
        Ok(state.db.set_user_active(&id.to_string(), active)?)
    })
    .await?;
    info!("User {} {}", id, if active { "activated" } else { "deactivated" });
    Ok(())
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_active(state, claims, id, false).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn activate_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    set_active(state, claims, id, true).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// POST /admin/campaigns/{id}/status — moderation override. Ownership
/// is bypassed; the transition map is not.
pub async fn moderate_campaign_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeCampaignStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&claims)?;

    let status = req.status;
    let campaign = blocking(move || {
        let campaign = state
            .db
            .get_campaign(&id.to_string())?
            .ok_or(ApiError::NotFound("Campaign"))?;
        let current: CampaignStatus =
            campaign.status.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        if !current.can_transition_to(status) {
            return Err(ApiError::InvalidTransition);
        }

        state.db.set_campaign_status(&id.to_string(), status.as_str())?;
        state
            .db
            .get_campaign(&id.to_string())?
            .ok_or(ApiError::NotFound("Campaign"))
    })
    .await?;
    info!("Campaign {} moderated to {}", id, status);
    Ok(Json(to_campaign_response(campaign)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use souq_db::queries::users::NewUser;

    fn claims_for(id: Uuid, user_type: UserType) -> Claims {
        Claims {
            sub: id,
            email: format!("{id}@example.com"),
            name: "Someone".into(),
            user_type,
            exp: usize::MAX,
        }
    }

    fn seed_user(state: &AppState, id: Uuid, user_type: &str) {
        state
            .db
            .create_user(&NewUser {
                id: &id.to_string(),
                email: &format!("{id}@example.com"),
                password_hash: Some("hash"),
                full_name: "Someone",
                user_type,
                email_verified: true,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn non_admin_gets_nothing() {
        let state = test_state();
        let brand = Uuid::new_v4();

        let err = stats(State(state.clone()), Extension(claims_for(brand, UserType::Brand)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn deactivation_flips_the_flag() {
        let state = test_state();
        let admin = Uuid::new_v4();
        let target = Uuid::new_v4();
        seed_user(&state, target, "creator");

        deactivate_user(
            State(state.clone()),
            Extension(claims_for(admin, UserType::Admin)),
            Path(target),
        )
        .await
        .expect("deactivate");
        let row = state.db.get_user_by_id(&target.to_string()).unwrap().unwrap();
        assert!(!row.is_active);

        activate_user(
            State(state.clone()),
            Extension(claims_for(admin, UserType::Admin)),
            Path(target),
        )
        .await
        .expect("activate");
        let row = state.db.get_user_by_id(&target.to_string()).unwrap().unwrap();
        assert!(row.is_active);
    }
}
