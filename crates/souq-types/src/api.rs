use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ApplicationStatus, CampaignStatus, TransactionStatus, UserType};

// -- JWT Claims --

/// JWT claims shared across souq-api (REST middleware) and souq-gateway
/// (WebSocket authentication). Canonical definition lives here in
/// souq-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    /// Display name, used by the gateway for presence and typing events.
    pub name: String,
    pub user_type: UserType,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub user_type: UserType,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub user_type: UserType,
    pub email_verified: bool,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub niche: Option<String>,
    pub platforms: Vec<String>,
    pub followers: Option<i64>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

/// Partial profile update — absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub niche: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub followers: Option<i64>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub avatar_url: Option<String>,
}

// -- Campaigns --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCampaignRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub campaign_types: Vec<String>,
    pub budget_min: i64,
    pub budget_max: i64,
    pub deadline: String,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
    /// Defaults to draft when omitted; `active` publishes immediately.
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCampaignRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub campaign_types: Option<Vec<String>>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub deadline: Option<String>,
    pub target_audience: Option<Vec<String>>,
    pub deliverables: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeCampaignStatusRequest {
    pub status: CampaignStatus,
}

#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub brand_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub campaign_types: Vec<String>,
    pub budget_min: i64,
    pub budget_max: i64,
    pub deadline: String,
    pub target_audience: Vec<String>,
    pub deliverables: Vec<String>,
    pub status: CampaignStatus,
    pub estimated_reach: i64,
    /// Derived, never stored.
    pub applications_count: i64,
    pub created_at: String,
}

// -- Applications --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyRequest {
    pub proposal: String,
    pub price: i64,
    pub timeline: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeApplicationStatusRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub campaign_title: String,
    pub creator_id: Uuid,
    pub creator_name: String,
    pub proposal: String,
    pub price: i64,
    pub timeline: String,
    pub status: ApplicationStatus,
    pub created_at: String,
}

// -- Messaging --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenConversationRequest {
    pub peer_id: Uuid,
    pub campaign_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub peer: ConversationPeer,
    pub last_message: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationPeer {
    pub id: Uuid,
    pub full_name: String,
    pub user_type: UserType,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub created_at: String,
}

// -- Portfolio --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortfolioItemRequest {
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PortfolioItemResponse {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageInput {
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    #[serde(default)]
    pub deliverables: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplacePackagesRequest {
    pub packages: Vec<PackageInput>,
}

#[derive(Debug, Serialize)]
pub struct PackageResponse {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub deliverables: Vec<String>,
    pub created_at: String,
}

// -- Payments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePaymentIntentRequest {
    /// Minor currency units, e.g. cents.
    pub amount: i64,
    pub currency: Option<String>,
    pub campaign_id: Uuid,
    pub creator_id: Uuid,
    pub application_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub payment_intent_id: String,
    pub application_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub creator_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionResponse>,
    pub held_total: i64,
    pub released_total: i64,
}

// -- Dashboard / admin --

#[derive(Debug, Serialize)]
pub struct BrandDashboard {
    pub campaigns_by_status: Vec<StatusCount>,
    pub total_applications: i64,
    pub pending_applications: i64,
    pub total_spent: i64,
    pub held_in_escrow: i64,
}

#[derive(Debug, Serialize)]
pub struct CreatorDashboard {
    pub applications_by_status: Vec<StatusCount>,
    pub earnings_released: i64,
    pub earnings_held: i64,
    pub portfolio_items: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub users_by_type: Vec<StatusCount>,
    pub campaigns_by_status: Vec<StatusCount>,
    pub transaction_volume: i64,
    pub transaction_count: i64,
}

// -- Uploads --

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}
