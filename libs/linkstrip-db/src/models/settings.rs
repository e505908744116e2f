use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SystemSetting {
    pub setting_key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
