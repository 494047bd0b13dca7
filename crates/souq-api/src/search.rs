use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use souq_db::queries::campaigns::CampaignFilter;
use souq_db::queries::users::CreatorFilter;
use souq_types::api::{CampaignResponse, UserResponse};
use souq_types::models::CampaignStatus;

use crate::campaigns::to_campaign_response;
use crate::error::ApiResult;
use crate::state::{AppState, blocking};
use crate::users::to_user_response;

#[derive(Debug, Default, Deserialize)]
pub struct CreatorSearchQuery {
    pub q: Option<String>,
    pub niche: Option<String>,
    pub platform: Option<String>,
    pub min_followers: Option<i64>,
    pub max_price: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /search/creators — public discovery over active, verified
/// creator accounts.
pub async fn search_creators(
    State(state): State<AppState>,
    Query(query): Query<CreatorSearchQuery>,
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

    let creators: Vec<UserResponse> =
        rows.into_iter().map(to_user_response).collect::<ApiResult<_>>()?;
    Ok(Json(creators))
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignSearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_budget: Option<i64>,
    pub max_budget: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /search/campaigns — active campaigns only.
pub async fn search_campaigns(
    State(state): State<AppState>,
    Query(query): Query<CampaignSearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let rows = blocking(move || {
        Ok(state.db.list_campaigns(&CampaignFilter {
            q: query.q,
            category: query.category,
            min_budget: query.min_budget,
            max_budget: query.max_budget,
            status: Some(CampaignStatus::Active.as_str().to_string()),
            brand_id: None,
            limit: query.limit.unwrap_or(20).min(50),
            offset: query.offset.unwrap_or(0),
        })?)
    })
    .await?;

    let campaigns: Vec<CampaignResponse> =
        rows.into_iter().map(to_campaign_response).collect::<ApiResult<_>>()?;
    Ok(Json(campaigns))
}
