use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::usage_log::UsageLogWithUser;

#[derive(Debug, Clone)]
pub struct UsageLogRepository {
    pool: PgPool,
}

impl UsageLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Today's ledger, newest first, joined to the owning account. The
    /// ledger itself is append-only; this is a pure report.
    pub async fn today_paged(&self, limit: i64, offset: i64) -> Result<Vec<UsageLogWithUser>> {
        let logs = sqlx::query_as::<_, UsageLogWithUser>(
            "SELECT
                ul.id, ul.token, ul.user_id, u.email AS user_email,
                ul.used_at, ul.request_url, ul.response_status
             FROM usage_logs ul
             LEFT JOIN api_keys ak ON ul.token = ak.token
             LEFT JOIN users u ON ak.user_id = u.id
             WHERE ul.used_at::date = CURRENT_DATE
             ORDER BY ul.used_at DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch usage logs")?;
        Ok(logs)
    }

    pub async fn count_all(&self) -> Result<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM usage_logs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count usage logs")?;
        Ok(total)
    }

    pub async fn count_for_token(&self, token: &str) -> Result<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM usage_logs WHERE token = $1")
            .bind(token)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count usage logs for token")?;
        Ok(total)
    }
}
