use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: String, // 'admin' | 'user'
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Admin listing row: account plus a rollup of its keys.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserWithKeys {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    /// Latest expiry across the account's keys, if it has any.
    pub api_expires: Option<DateTime<Utc>>,
    pub key_count: i64,
    pub total_requests: i64,
}
