use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

/// Cache-aside capability used by the listing/report paths. Never
/// authoritative: values carry a TTL and every mutation of the underlying
/// rows invalidates instead of updating. The consumption path does not go
/// through here at all.
#[async_trait]
pub trait Cache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;
    async fn invalidate(&self, key: &str) -> Result<()>;
}

pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Invalid Redis URL")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("Failed to connect to Redis")?;
        info!("Redis connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .context("Redis GET failed")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async(&mut conn)
            .await
            .context("Redis SETEX failed")?;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .context("Redis DEL failed")?;
        Ok(())
    }
}

/// In-process substitute so services can be exercised without a Redis
/// backend. Honors TTLs against a monotonic clock.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        Ok(entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        entries.insert(
            key.to_string(),
            (value.to_string(), Instant::now() + Duration::from_secs(ttl_seconds)),
        );
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Read a cached JSON value. Any cache failure degrades to a miss so the
/// caller falls through to the authoritative store.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, "discarding unparsable cache entry: {e}");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key, "cache read failed, falling back to store: {e:#}");
            None
        }
    }
}

/// Populate a cache key; failures are logged and swallowed, the response
/// was already computed from the store.
pub async fn put_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl_seconds: u64) {
    match serde_json::to_string(value) {
        Ok(raw) => {
            if let Err(e) = cache.set(key, &raw, ttl_seconds).await {
                warn!(key, "cache write failed: {e:#}");
            }
        }
        Err(e) => warn!(key, "failed to serialize cache value: {e}"),
    }
}

pub async fn drop_key(cache: &dyn Cache, key: &str) {
    if let Err(e) = cache.invalidate(key).await {
        warn!(key, "cache invalidation failed: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        n: i32,
    }

    #[tokio::test]
    async fn memory_cache_round_trip_and_invalidate() {
        let cache = MemoryCache::new();
        put_json(&cache, "k", &Payload { n: 42 }, 60).await;
        assert_eq!(get_json::<Payload>(&cache, "k").await, Some(Payload { n: 42 }));

        drop_key(&cache, "k").await;
        assert_eq!(get_json::<Payload>(&cache, "k").await, None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let cache = MemoryCache::new();
        cache.set("k", "\"v\"", 0).await.unwrap();
        assert_eq!(get_json::<String>(&cache, "k").await, None);
    }

    #[tokio::test]
    async fn unparsable_entries_degrade_to_miss() {
        let cache = MemoryCache::new();
        cache.set("k", "{not json", 60).await.unwrap();
        assert_eq!(get_json::<Payload>(&cache, "k").await, None);
    }
}
