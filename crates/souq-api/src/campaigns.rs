use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use souq_db::models::{ApplicationRow, CampaignRow};
use souq_db::queries::applications::NewApplication;
use souq_db::queries::campaigns::{CampaignFilter, CampaignPatch, NewCampaign};
use souq_db::queries::is_unique_violation;
use souq_types::api::{
    ApplicationResponse, ApplyRequest, CampaignResponse, ChangeApplicationStatusRequest,
    ChangeCampaignStatusRequest, Claims, CreateCampaignRequest, UpdateCampaignRequest,
};
use souq_types::events::GatewayEvent;
use souq_types::models::{ApplicationStatus, CampaignStatus, UserType};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

/// Rough reach estimate shown next to a draft: a CPM-style multiple of
/// the budget midpoint plus a fixed bump per audience segment. A hint
/// for brands, not a prediction. Saturating: absurd budgets pin the
/// estimate at i64::MAX instead of overflowing.
pub(crate) fn estimated_reach(budget_min: i64, budget_max: i64, audience_segments: usize) -> i64 {
    let midpoint = budget_min.saturating_add(budget_max) / 2;
    midpoint
        .saturating_mul(40)
        .saturating_add(2_500_i64.saturating_mul(audience_segments as i64))
}

fn encode_json(values: &[String]) -> ApiResult<String> {
    serde_json::to_string(values).map_err(|e| anyhow::anyhow!("json encoding failed: {}", e).into())
}

pub(crate) fn to_campaign_response(row: CampaignRow) -> ApiResult<CampaignResponse> {
    Ok(CampaignResponse {
        id: row.id.parse().map_err(|e| anyhow::anyhow!("corrupt campaign id: {}", e))?,
        brand_id: row.brand_id.parse().map_err(|e| anyhow::anyhow!("corrupt brand id: {}", e))?,
        brand_name: row.brand_name,
        title: row.title,
        description: row.description,
        category: row.category,
        campaign_types: serde_json::from_str(&row.campaign_types).unwrap_or_default(),
        budget_min: row.budget_min,
        budget_max: row.budget_max,
        deadline: row.deadline,
        target_audience: serde_json::from_str(&row.target_audience).unwrap_or_default(),
        deliverables: serde_json::from_str(&row.deliverables).unwrap_or_default(),
        status: row.status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        estimated_reach: row.estimated_reach,
        applications_count: row.applications_count,
        created_at: row.created_at,
    })
}

pub(crate) fn to_application_response(row: ApplicationRow) -> ApiResult<ApplicationResponse> {
    Ok(ApplicationResponse {
        id: row.id.parse().map_err(|e| anyhow::anyhow!("corrupt application id: {}", e))?,
        campaign_id: row
            .campaign_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt campaign id: {}", e))?,
        campaign_title: row.campaign_title,
        creator_id: row
            .creator_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt creator id: {}", e))?,
        creator_name: row.creator_name,
        proposal: row.proposal,
        price: row.price,
        timeline: row.timeline,
        status: row.status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        created_at: row.created_at,
    })
}

fn fetch_campaign(state: &AppState, id: Uuid) -> ApiResult<CampaignRow> {
    state
        .db
        .get_campaign(&id.to_string())?
        .ok_or(ApiError::NotFound("Campaign"))
}

/// Owner brand or admin.
fn check_campaign_access(claims: &Claims, campaign: &CampaignRow) -> ApiResult<()> {
    if claims.user_type == UserType::Admin || campaign.brand_id == claims.sub.to_string() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only the campaign owner can do this"))
    }
}

// -- Campaigns --

pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<impl IntoResponse> {
    if claims.user_type != UserType::Brand {
        return Err(ApiError::Forbidden("Only brands can create campaigns"));
    }
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }
    if req.budget_min < 0 || req.budget_min > req.budget_max {
        return Err(ApiError::Validation("Invalid budget range".into()));
    }
    let deadline = chrono::NaiveDate::parse_from_str(&req.deadline, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Deadline must be a YYYY-MM-DD date".into()))?;
    if deadline < chrono::Utc::now().date_naive() {
        return Err(ApiError::Validation("Deadline is in the past".into()));
    }
    let status = match req.status {
        None | Some(CampaignStatus::Draft) => CampaignStatus::Draft,
        Some(CampaignStatus::Active) => CampaignStatus::Active,
        Some(_) => return Err(ApiError::Validation("New campaigns start as draft or active".into())),
    };

    let id = Uuid::new_v4();
    let reach = estimated_reach(req.budget_min, req.budget_max, req.target_audience.len());

    // Run blocking DB work off the async runtime
    let campaign = blocking(move || {
        state.db.create_campaign(&NewCampaign {
            id: &id.to_string(),
            brand_id: &claims.sub.to_string(),
            title: req.title.trim(),
            description: &req.description,
            category: &req.category,
            campaign_types: &encode_json(&req.campaign_types)?,
            budget_min: req.budget_min,
            budget_max: req.budget_max,
            deadline: &req.deadline,
            target_audience: &encode_json(&req.target_audience)?,
            deliverables: &encode_json(&req.deliverables)?,
            status: status.as_str(),
            estimated_reach: reach,
        })?;
        fetch_campaign(&state, id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(to_campaign_response(campaign)?)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignsQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_budget: Option<i64>,
    pub max_budget: Option<i64>,
    /// `mine=true` lists the calling brand's own campaigns, drafts
    /// included.
    pub mine: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<CampaignsQuery>,
) -> ApiResult<impl IntoResponse> {
    let brand_id = if query.mine.unwrap_or(false) {
        if claims.user_type != UserType::Brand {
            return Err(ApiError::Forbidden("Only brands have their own campaigns"));
        }
        Some(claims.sub.to_string())
    } else {
        None
    };

    let rows = blocking(move || {
        Ok(state.db.list_campaigns(&CampaignFilter {
            q: query.q,
            category: query.category,
            min_budget: query.min_budget,
            max_budget: query.max_budget,
            status: None,
            brand_id,
            limit: query.limit.unwrap_or(20).min(50),
            offset: query.offset.unwrap_or(0),
        })?)
    })
    .await?;

    let campaigns: Vec<CampaignResponse> = rows
        .into_iter()
        .map(to_campaign_response)
        .collect::<ApiResult<_>>()?;
    Ok(Json(campaigns))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let campaign = blocking(move || fetch_campaign(&state, id)).await?;
    Ok(Json(to_campaign_response(campaign)?))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCampaignRequest>,
) -> ApiResult<impl IntoResponse> {
    if let (Some(min), Some(max)) = (req.budget_min, req.budget_max) {
        if min < 0 || min > max {
            return Err(ApiError::Validation("Invalid budget range".into()));
        }
    }

    let campaign_types = req.campaign_types.as_deref().map(encode_json).transpose()?;
    let target_audience = req.target_audience.as_deref().map(encode_json).transpose()?;
    let deliverables = req.deliverables.as_deref().map(encode_json).transpose()?;

    let campaign = blocking(move || {
        let campaign = fetch_campaign(&state, id)?;
        check_campaign_access(&claims, &campaign)?;

        state.db.update_campaign(
            &id.to_string(),
            &CampaignPatch {
                title: req.title,
                description: req.description,
                category: req.category,
                campaign_types,
                budget_min: req.budget_min,
                budget_max: req.budget_max,
                deadline: req.deadline,
                target_audience,
                deliverables,
            },
        )?;
        fetch_campaign(&state, id)
    })
    .await?;
    Ok(Json(to_campaign_response(campaign)?))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    blocking(move || {
        let campaign = fetch_campaign(&state, id)?;
        check_campaign_access(&claims, &campaign)?;

        // Campaigns with applications carry history; cancel instead.
        if campaign.applications_count > 0 {
            return Err(ApiError::Conflict(
                "Campaigns with applications cannot be deleted, cancel instead",
            ));
        }

        Ok(state.db.delete_campaign(&id.to_string())?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_campaign_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeCampaignStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let campaign = blocking(move || {
        let campaign = fetch_campaign(&state, id)?;
        check_campaign_access(&claims, &campaign)?;

        let current: CampaignStatus =
            campaign.status.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        if !current.can_transition_to(req.status) {
            return Err(ApiError::InvalidTransition);
        }

        state.db.set_campaign_status(&id.to_string(), req.status.as_str())?;
        fetch_campaign(&state, id)
    })
    .await?;
    Ok(Json(to_campaign_response(campaign)?))
}

// -- Applications --

pub async fn apply_to_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplyRequest>,
) -> ApiResult<impl IntoResponse> {
    if claims.user_type != UserType::Creator {
        return Err(ApiError::Forbidden("Only creators can apply to campaigns"));
    }
    if req.proposal.trim().is_empty() {
        return Err(ApiError::Validation("A proposal is required".into()));
    }
    if req.price <= 0 {
        return Err(ApiError::Validation("Price must be positive".into()));
    }

    let application_id = Uuid::new_v4();
    let application = blocking(move || {
        let campaign = fetch_campaign(&state, id)?;
        if campaign.status != CampaignStatus::Active.as_str() {
            return Err(ApiError::CampaignNotOpen);
        }

        let created = state.db.create_application(&NewApplication {
            id: &application_id.to_string(),
            campaign_id: &id.to_string(),
            creator_id: &claims.sub.to_string(),
            proposal: req.proposal.trim(),
            price: req.price,
            timeline: &req.timeline,
        });
        if let Err(e) = created {
            if is_unique_violation(&e) {
                return Err(ApiError::AlreadyApplied);
            }
            return Err(e.into());
        }

        state
            .db
            .get_application(&application_id.to_string())?
            .ok_or_else(|| anyhow::anyhow!("application vanished after insert").into())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(to_application_response(application)?)))
}

pub async fn list_campaign_applications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let rows = blocking(move || {
        let campaign = fetch_campaign(&state, id)?;
        check_campaign_access(&claims, &campaign)?;
        Ok(state.db.list_applications_for_campaign(&id.to_string())?)
    })
    .await?;
    let applications: Vec<ApplicationResponse> = rows
        .into_iter()
        .map(to_application_response)
        .collect::<ApiResult<_>>()?;
    Ok(Json(applications))
}

pub async fn my_applications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    if claims.user_type != UserType::Creator {
        return Err(ApiError::Forbidden("Only creators have applications"));
    }

    let rows =
        blocking(move || Ok(state.db.list_applications_for_creator(&claims.sub.to_string())?))
            .await?;
    let applications: Vec<ApplicationResponse> = rows
        .into_iter()
        .map(to_application_response)
        .collect::<ApiResult<_>>()?;
    Ok(Json(applications))
}

pub async fn change_application_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeApplicationStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = req.status;
    let db_state = state.clone();
    let application = blocking(move || {
        let application = db_state
            .db
            .get_application(&id.to_string())?
            .ok_or(ApiError::NotFound("Application"))?;
        let campaign = db_state
            .db
            .get_campaign(&application.campaign_id)?
            .ok_or(ApiError::NotFound("Campaign"))?;
        check_campaign_access(&claims, &campaign)?;

        let current: ApplicationStatus = application
            .status
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        if !current.can_transition_to(status) {
            return Err(ApiError::InvalidTransition);
        }

        db_state.db.set_application_status(&id.to_string(), status.as_str())?;
        db_state
            .db
            .get_application(&id.to_string())?
            .ok_or(ApiError::NotFound("Application"))
    })
    .await?;

    // Best-effort heads-up for the creator if they are connected
    if let (Ok(creator_id), Ok(campaign_id)) = (
        application.creator_id.parse::<Uuid>(),
        application.campaign_id.parse::<Uuid>(),
    ) {
        state
            .dispatcher
            .send_to_user(
                creator_id,
                GatewayEvent::ApplicationUpdate {
                    application_id: id,
                    campaign_id,
                    status: status.as_str().to_string(),
                },
            )
            .await;
    }

    Ok(Json(to_application_response(application)?))
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

    fn campaign_req(status: Option<CampaignStatus>) -> CreateCampaignRequest {
        CreateCampaignRequest {
            title: "Ramadan Recipe Collection".into(),
            description: "Share your best iftar recipes".into(),
            category: "food".into(),
            campaign_types: vec!["sponsored_post".into()],
            budget_min: 500,
            budget_max: 2000,
            deadline: "2031-10-01".into(),
            target_audience: vec!["families".into(), "foodies".into()],
            deliverables: vec!["1 reel".into()],
            status,
        }
    }

    async fn seed_active_campaign(state: &AppState, brand: Uuid) -> Uuid {
        seed_user(state, brand, "brand");
        create_campaign(
            State(state.clone()),
            Extension(claims_for(brand, UserType::Brand)),
            Json(campaign_req(Some(CampaignStatus::Active))),
        )
        .await
        .expect("campaign creation should succeed");

        let rows = state
            .db
            .list_campaigns(&CampaignFilter { limit: 10, ..Default::default() })
            .unwrap();
        rows[0].id.parse().unwrap()
    }

    #[test]
    fn reach_heuristic_scales_with_budget_and_audience() {
        assert_eq!(estimated_reach(500, 2000, 2), 1250 * 40 + 5000);
        assert_eq!(estimated_reach(0, 0, 0), 0);
        assert!(estimated_reach(1000, 5000, 1) > estimated_reach(100, 500, 1));
    }

    #[test]
    fn reach_heuristic_saturates_on_absurd_budgets() {
        assert_eq!(estimated_reach(i64::MAX, i64::MAX, 4), i64::MAX);
        assert_eq!(estimated_reach(i64::MAX / 2, i64::MAX / 2, 0), i64::MAX);
    }

    #[tokio::test]
    async fn non_brand_cannot_create_campaigns() {
        let state = test_state();
        let creator = Uuid::new_v4();
        seed_user(&state, creator, "creator");

        let err = create_campaign(
            State(state.clone()),
            Extension(claims_for(creator, UserType::Creator)),
            Json(campaign_req(None)),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn apply_flow_creates_pending_application() {
        let state = test_state();
        let brand = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let campaign_id = seed_active_campaign(&state, brand).await;
        seed_user(&state, creator, "creator");

        apply_to_campaign(
            State(state.clone()),
            Extension(claims_for(creator, UserType::Creator)),
            Path(campaign_id),
            Json(ApplyRequest {
                proposal: "I will film a three-part iftar series".into(),
                price: 700,
                timeline: "7 days".into(),
            }),
        )
        .await
        .expect("application should succeed");

        let campaign = state.db.get_campaign(&campaign_id.to_string()).unwrap().unwrap();
        assert_eq!(campaign.applications_count, 1);

        let apps = state.db.list_applications_for_campaign(&campaign_id.to_string()).unwrap();
        assert_eq!(apps[0].status, "pending");
    }

    #[tokio::test]
    async fn brand_cannot_apply() {
        let state = test_state();
        let brand = Uuid::new_v4();
        let campaign_id = seed_active_campaign(&state, brand).await;

        let err = apply_to_campaign(
            State(state.clone()),
            Extension(claims_for(brand, UserType::Brand)),
            Path(campaign_id),
            Json(ApplyRequest {
                proposal: "self-deal".into(),
                price: 1,
                timeline: "now".into(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn duplicate_application_conflicts() {
        let state = test_state();
        let brand = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let campaign_id = seed_active_campaign(&state, brand).await;
        seed_user(&state, creator, "creator");

        let apply = |state: AppState| {
            apply_to_campaign(
                State(state),
                Extension(claims_for(creator, UserType::Creator)),
                Path(campaign_id),
                Json(ApplyRequest {
                    proposal: "proposal".into(),
                    price: 700,
                    timeline: "7 days".into(),
                }),
            )
        };
        apply(state.clone()).await.expect("first application succeeds");

        let err = apply(state.clone()).await.err().unwrap();
        assert!(matches!(err, ApiError::AlreadyApplied));
    }

    #[tokio::test]
    async fn applications_to_paused_campaigns_conflict() {
        let state = test_state();
        let brand = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let campaign_id = seed_active_campaign(&state, brand).await;
        seed_user(&state, creator, "creator");

        change_campaign_status(
            State(state.clone()),
            Extension(claims_for(brand, UserType::Brand)),
            Path(campaign_id),
            Json(ChangeCampaignStatusRequest { status: CampaignStatus::Paused }),
        )
        .await
        .expect("pause should succeed");

        let err = apply_to_campaign(
            State(state.clone()),
            Extension(claims_for(creator, UserType::Creator)),
            Path(campaign_id),
            Json(ApplyRequest {
                proposal: "proposal".into(),
                price: 700,
                timeline: "7 days".into(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::CampaignNotOpen));
    }

    #[tokio::test]
    async fn off_map_campaign_transition_is_rejected() {
        let state = test_state();
        let brand = Uuid::new_v4();
        let campaign_id = seed_active_campaign(&state, brand).await;
        let claims = claims_for(brand, UserType::Brand);

        change_campaign_status(
            State(state.clone()),
            Extension(claims.clone()),
            Path(campaign_id),
            Json(ChangeCampaignStatusRequest { status: CampaignStatus::Completed }),
        )
        .await
        .expect("active -> completed is legal");

        let err = change_campaign_status(
            State(state.clone()),
            Extension(claims),
            Path(campaign_id),
            Json(ChangeCampaignStatusRequest { status: CampaignStatus::Active }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::InvalidTransition));
    }

    #[tokio::test]
    async fn only_owner_accepts_applications() {
        let state = test_state();
        let brand = Uuid::new_v4();
        let other_brand = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let campaign_id = seed_active_campaign(&state, brand).await;
        seed_user(&state, other_brand, "brand");
        seed_user(&state, creator, "creator");

        apply_to_campaign(
            State(state.clone()),
            Extension(claims_for(creator, UserType::Creator)),
            Path(campaign_id),
            Json(ApplyRequest {
                proposal: "proposal".into(),
                price: 700,
                timeline: "7 days".into(),
            }),
        )
        .await
        .unwrap();
        let application_id: Uuid = state
            .db
            .list_applications_for_campaign(&campaign_id.to_string())
            .unwrap()[0]
            .id
            .parse()
            .unwrap();

        let err = change_application_status(
            State(state.clone()),
            Extension(claims_for(other_brand, UserType::Brand)),
            Path(application_id),
            Json(ChangeApplicationStatusRequest { status: ApplicationStatus::Accepted }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::Forbidden(_)));

        change_application_status(
            State(state.clone()),
            Extension(claims_for(brand, UserType::Brand)),
            Path(application_id),
            Json(ChangeApplicationStatusRequest { status: ApplicationStatus::Accepted }),
        )
        .await
        .expect("owner can accept");

        // rejected is no longer reachable from accepted
        let err = change_application_status(
            State(state.clone()),
            Extension(claims_for(brand, UserType::Brand)),
            Path(application_id),
            Json(ChangeApplicationStatusRequest { status: ApplicationStatus::Rejected }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::InvalidTransition));
    }
}
