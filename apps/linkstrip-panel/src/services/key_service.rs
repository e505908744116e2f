use std::sync::Arc;

use linkstrip_db::KeyError;
use linkstrip_db::models::api_key::{ApiKey, ApiKeyWithUsage, KeyStatus, Plan};
use linkstrip_db::repositories::api_key_repo::ApiKeyRepository;
use sqlx::PgPool;
use tracing::info;

use super::cache::{self, Cache};
use super::stats_service::STATS_CACHE_KEY;
use super::user_service::USERS_CACHE_KEY;

pub const KEYS_CACHE_KEY: &str = "admin:api-keys";
const KEYS_CACHE_TTL: u64 = 300;

/// Key lifecycle manager plus the consumption/verification front. Admin
/// authorization happens at the HTTP boundary; this type owns the mutation
/// rules and keeps the cached listings honest.
pub struct KeyService {
    repo: ApiKeyRepository,
    cache: Arc<dyn Cache>,
}

impl KeyService {
    pub fn new(pool: PgPool, cache: Arc<dyn Cache>) -> Self {
        Self {
            repo: ApiKeyRepository::new(pool),
            cache,
        }
    }

    /// Listings and aggregates that embed key data. Deleted, never updated
    /// in place: the cache is not authoritative. Runs only after the
    /// database commit so the row lock is never held across cache I/O.
    async fn invalidate_listings(&self) {
        cache::drop_key(self.cache.as_ref(), KEYS_CACHE_KEY).await;
        cache::drop_key(self.cache.as_ref(), USERS_CACHE_KEY).await;
        cache::drop_key(self.cache.as_ref(), STATS_CACHE_KEY).await;
    }

    pub async fn create(
        &self,
        user_id: i64,
        token_len: usize,
        expiry_days: i64,
        total_quota: i32,
        plan: Plan,
    ) -> Result<ApiKey, KeyError> {
        let key = self
            .repo
            .create(user_id, token_len, expiry_days, total_quota, plan)
            .await?;
        info!(key_id = key.id, user_id, plan = %key.plan, "issued API key");
        self.invalidate_listings().await;
        Ok(key)
    }

    pub async fn renew(&self, key_id: i64, days: i64, add_quota: i32) -> Result<ApiKey, KeyError> {
        let key = self.repo.renew(key_id, days, add_quota).await?;
        info!(key_id, days, add_quota, "renewed API key");
        self.invalidate_listings().await;
        Ok(key)
    }

    pub async fn add_quota(&self, key_id: i64, amount: i32) -> Result<ApiKey, KeyError> {
        let key = self.repo.add_quota(key_id, amount).await?;
        info!(key_id, amount, "topped up API key quota");
        self.invalidate_listings().await;
        Ok(key)
    }

    pub async fn delete(&self, key_id: i64) -> Result<(), KeyError> {
        self.repo.delete(key_id).await?;
        info!(key_id, "deleted API key");
        self.invalidate_listings().await;
        Ok(())
    }

    /// The metered consumption path. Goes straight to the authoritative
    /// store; the cache layer plays no part here.
    pub async fn consume(&self, token: &str, request_url: Option<&str>) -> Result<i32, KeyError> {
        self.repo.consume(token, request_url, 200).await
    }

    pub async fn verify(&self, token: &str) -> Result<KeyStatus, KeyError> {
        self.repo.verify(token).await
    }

    pub async fn newest_active_for_user(&self, user_id: i64) -> Result<Option<ApiKey>, KeyError> {
        self.repo.newest_active_for_user(user_id).await
    }

    /// Admin listing with per-key request counts, cache-aside.
    pub async fn list_with_usage(&self) -> Result<Vec<ApiKeyWithUsage>, KeyError> {
        if let Some(keys) =
            cache::get_json::<Vec<ApiKeyWithUsage>>(self.cache.as_ref(), KEYS_CACHE_KEY).await
        {
            return Ok(keys);
        }

        let keys = self.repo.list_with_usage().await?;
        cache::put_json(self.cache.as_ref(), KEYS_CACHE_KEY, &keys, KEYS_CACHE_TTL).await;
        Ok(keys)
    }
}
