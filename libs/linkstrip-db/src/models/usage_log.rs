use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One ledger row per successful quota decrement. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageLog {
    pub id: i64,
    pub token: String,
    pub user_id: Option<i64>,
    pub used_at: DateTime<Utc>,
    pub request_url: Option<String>,
    pub response_status: Option<i32>,
}

/// Ledger row joined to the owning account for the admin screen.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageLogWithUser {
    pub id: i64,
    pub token: String,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub used_at: DateTime<Utc>,
    pub request_url: Option<String>,
    pub response_status: Option<i32>,
}
