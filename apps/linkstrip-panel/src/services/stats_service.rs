use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::cache::{self, Cache};

pub const STATS_CACHE_KEY: &str = "admin:stats";
const STATS_CACHE_TTL: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminStats {
    pub total_users: i64,
    pub admin_count: i64,
    pub user_count: i64,
    pub total_api_keys: i64,
    pub active_api_keys: i64,
    pub today_requests: i64,
    pub total_requests: i64,
    pub active_users_today: i64,
    pub total_quota: i64,
}

pub struct StatsService {
    pool: PgPool,
    cache: Arc<dyn Cache>,
}

impl StatsService {
    pub fn new(pool: PgPool, cache: Arc<dyn Cache>) -> Self {
        Self { pool, cache }
    }

    /// Dashboard counters. One round trip of correlated subqueries; cached
    /// briefly because the admin dashboard polls it.
    pub async fn admin_stats(&self) -> Result<AdminStats> {
        if let Some(stats) =
            cache::get_json::<AdminStats>(self.cache.as_ref(), STATS_CACHE_KEY).await
        {
            return Ok(stats);
        }

        let stats = sqlx::query_as::<_, AdminStats>(
            "SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE role = 'admin') AS admin_count,
                (SELECT COUNT(*) FROM users WHERE role = 'user') AS user_count,
                (SELECT COUNT(*) FROM api_keys) AS total_api_keys,
                (SELECT COUNT(*) FROM api_keys WHERE expires_at > now()) AS active_api_keys,
                (SELECT COUNT(*) FROM usage_logs WHERE used_at::date = CURRENT_DATE) AS today_requests,
                (SELECT COUNT(*) FROM usage_logs) AS total_requests,
                (SELECT COUNT(DISTINCT user_id) FROM usage_logs WHERE used_at::date = CURRENT_DATE) AS active_users_today,
                (SELECT COALESCE(SUM(total_quota), 0)::BIGINT FROM api_keys) AS total_quota",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to fetch admin stats")?;

        cache::put_json(self.cache.as_ref(), STATS_CACHE_KEY, &stats, STATS_CACHE_TTL).await;
        Ok(stats)
    }
}
