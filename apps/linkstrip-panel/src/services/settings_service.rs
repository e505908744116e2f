use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use linkstrip_db::repositories::settings_repo::SettingsRepository;
use sqlx::PgPool;
use tracing::info;

use super::cache::{self, Cache};

pub const SETTINGS_CACHE_KEY: &str = "settings:public";
const SETTINGS_CACHE_TTL: u64 = 300;

/// Keys exposed on the public settings endpoint. Everything else in
/// system_settings stays admin-only.
const PUBLIC_KEYS: [&str; 4] = ["tutorial", "faq", "contact_email", "announcement"];

pub struct SettingsService {
    repo: SettingsRepository,
    cache: Arc<dyn Cache>,
}

impl SettingsService {
    pub fn new(pool: PgPool, cache: Arc<dyn Cache>) -> Self {
        Self {
            repo: SettingsRepository::new(pool),
            cache,
        }
    }

    /// Public site copy (tutorial, FAQ, announcement, contact), cache-aside.
    pub async fn get_public(&self) -> Result<HashMap<String, String>> {
        if let Some(settings) =
            cache::get_json::<HashMap<String, String>>(self.cache.as_ref(), SETTINGS_CACHE_KEY)
                .await
        {
            return Ok(settings);
        }

        let all = self.repo.get_all().await?;
        let public: HashMap<String, String> = PUBLIC_KEYS
            .iter()
            .map(|&k| (k.to_string(), all.get(k).cloned().unwrap_or_default()))
            .collect();

        cache::put_json(
            self.cache.as_ref(),
            SETTINGS_CACHE_KEY,
            &public,
            SETTINGS_CACHE_TTL,
        )
        .await;
        Ok(public)
    }

    pub async fn get_all(&self) -> Result<HashMap<String, String>> {
        self.repo.get_all().await
    }

    /// Writes go to the store, then the cached copy is dropped.
    pub async fn update(&self, settings: HashMap<String, String>) -> Result<()> {
        let accepted: HashMap<String, String> = settings
            .into_iter()
            .filter(|(k, _)| PUBLIC_KEYS.contains(&k.as_str()))
            .collect();
        if accepted.is_empty() {
            return Ok(());
        }

        self.repo.set_many(&accepted).await?;
        info!(count = accepted.len(), "updated site settings");
        cache::drop_key(self.cache.as_ref(), SETTINGS_CACHE_KEY).await;
        Ok(())
    }
}
