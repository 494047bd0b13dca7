/// Database row types — these map directly to SQLite rows.
/// Distinct from souq-types API models to keep the DB layer independent.
/// JSON array columns (platforms, deliverables, ...) stay as raw TEXT
/// here and are decoded at the API boundary.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: Option<String>,
    pub full_name: String,
    pub user_type: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub niche: Option<String>,
    pub platforms: String,
    pub followers: Option<i64>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

pub struct CampaignRow {
    pub id: String,
    pub brand_id: String,
    pub brand_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub campaign_types: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub deadline: String,
    pub target_audience: String,
    pub deliverables: String,
    pub status: String,
    pub estimated_reach: i64,
    pub applications_count: i64,
    pub created_at: String,
}

pub struct ApplicationRow {
    pub id: String,
    pub campaign_id: String,
    pub campaign_title: String,
    pub creator_id: String,
    pub creator_name: String,
    pub proposal: String,
    pub price: i64,
    pub timeline: String,
    pub status: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub campaign_id: Option<String>,
    pub peer_id: String,
    pub peer_name: String,
    pub peer_type: String,
    pub peer_avatar_url: Option<String>,
    pub last_message: Option<String>,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub created_at: String,
}

pub struct PortfolioItemRow {
    pub id: String,
    pub creator_id: String,
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub created_at: String,
}

pub struct PackageRow {
    pub id: String,
    pub creator_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub deliverables: String,
    pub created_at: String,
}

pub struct TransactionRow {
    pub id: String,
    pub stripe_event_id: String,
    pub payment_intent_id: String,
    pub application_id: Option<String>,
    pub campaign_id: Option<String>,
    pub brand_id: Option<String>,
    pub creator_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub created_at: String,
}

/// (status, count) pair for dashboard aggregates.
pub struct StatusCountRow {
    pub status: String,
    pub count: i64,
}
