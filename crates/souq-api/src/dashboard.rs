use axum::{Extension, Json, extract::State, response::IntoResponse};

use souq_db::models::StatusCountRow;
use souq_types::api::{BrandDashboard, Claims, CreatorDashboard, StatusCount};
use souq_types::models::{TransactionStatus, UserType};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

pub(crate) fn to_status_counts(rows: Vec<StatusCountRow>) -> Vec<StatusCount> {
    rows.into_iter()
        .map(|row| StatusCount { status: row.status, count: row.count })
        .collect()
}

/// GET /analytics/dashboard — shape depends on who is asking.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<axum::response::Response> {
    let user_id = claims.sub.to_string();
    blocking(move || match claims.user_type {
        UserType::Brand => {
            let (total, pending) = state.db.count_applications_for_brand(&user_id)?;
            let body = BrandDashboard {
                campaigns_by_status: to_status_counts(
                    state.db.count_campaigns_by_status(Some(&user_id))?,
                ),
                total_applications: total,
                pending_applications: pending,
                total_spent: state.db.sum_transactions(
                    &user_id,
                    true,
                    TransactionStatus::Released.as_str(),
                )?,
                held_in_escrow: state.db.sum_transactions(
                    &user_id,
                    true,
                    TransactionStatus::Held.as_str(),
                )?,
            };
            Ok(Json(body).into_response())
        }
        UserType::Creator => {
            let body = CreatorDashboard {
                applications_by_status: to_status_counts(
                    state.db.count_applications_by_status(&user_id)?,
                ),
                earnings_released: state.db.sum_transactions(
                    &user_id,
                    false,
                    TransactionStatus::Released.as_str(),
                )?,
                earnings_held: state.db.sum_transactions(
                    &user_id,
                    false,
                    TransactionStatus::Held.as_str(),
                )?,
                portfolio_items: state.db.count_portfolio_items(&user_id)?,
            };
            Ok(Json(body).into_response())
        }
        UserType::Admin => Err(ApiError::Forbidden("Admins use /admin/stats")),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use souq_db::queries::applications::NewApplication;
    use souq_db::queries::campaigns::NewCampaign;
    use souq_db::queries::users::NewUser;
    use uuid::Uuid;

    fn claims_for(id: Uuid, user_type: UserType) -> Claims {
        Claims {
            sub: id,
            email: format!("{id}@example.com"),
            name: "Someone".into(),
            user_type,
            exp: usize::MAX,
        }
    }

    #[tokio::test]
    async fn brand_dashboard_counts_pending_applications() {
        let state = test_state();
        let (brand, creator) = (Uuid::new_v4(), Uuid::new_v4());
        for (id, user_type) in [(brand, "brand"), (creator, "creator")] {
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
        state
            .db
            .create_campaign(&NewCampaign {
                id: "camp1",
                brand_id: &brand.to_string(),
                title: "Ramadan series",
                description: "",
                category: "food",
                campaign_types: "[]",
                budget_min: 500,
                budget_max: 2000,
                deadline: "2026-10-01",
                target_audience: "[]",
                deliverables: "[]",
                status: "active",
                estimated_reach: 50_000,
            })
            .unwrap();
        state
            .db
            .create_application(&NewApplication {
                id: "app1",
                campaign_id: "camp1",
                creator_id: &creator.to_string(),
                proposal: "proposal",
                price: 700,
                timeline: "7 days",
            })
            .unwrap();

        let response = dashboard(
            State(state.clone()),
            Extension(claims_for(brand, UserType::Brand)),
        )
        .await
        .expect("brand dashboard");
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let (total, pending) = state.db.count_applications_for_brand(&brand.to_string()).unwrap();
        assert_eq!((total, pending), (1, 1));
    }

    #[tokio::test]
    async fn admin_is_redirected_to_stats() {
        let state = test_state();
        let err = dashboard(
            State(state.clone()),
            Extension(claims_for(Uuid::new_v4(), UserType::Admin)),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
