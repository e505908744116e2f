use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    pub id: i64,
    pub token: String,
    pub user_id: Option<i64>,
    pub plan: String, // 'basic' | 'pro' | 'enterprise'
    pub total_quota: i32,
    pub remaining_quota: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Informational pricing tier. Does not gate behavior beyond display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    Pro,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Plan> {
        match s {
            "basic" => Some(Plan::Basic),
            "pro" => Some(Plan::Pro),
            "enterprise" => Some(Plan::Enterprise),
            _ => None,
        }
    }
}

/// Read-only view returned by the verify path: enough for a client to decide
/// whether to enable the parse action, nothing more.
#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub remaining: i32,
    pub plan: String,
    pub expires_at: DateTime<Utc>,
}

/// Admin listing row: key joined to its owner and ledger count.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKeyWithUsage {
    pub id: i64,
    pub token: String,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub plan: String,
    pub total_quota: i32,
    pub remaining_quota: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub total_requests: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_round_trips_known_tiers() {
        for s in ["basic", "pro", "enterprise"] {
            assert_eq!(Plan::parse(s).unwrap().as_str(), s);
        }
        assert!(Plan::parse("platinum").is_none());
        assert!(Plan::parse("Basic").is_none());
    }

    #[test]
    fn expiry_is_exclusive_of_now() {
        let now = Utc::now();
        let key = ApiKey {
            id: 1,
            token: "t".into(),
            user_id: None,
            plan: "basic".into(),
            total_quota: 10,
            remaining_quota: 10,
            expires_at: now,
            created_at: now,
        };
        // A key expiring exactly now is already unusable.
        assert!(key.is_expired(now));
    }
}
