use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT setting_key, value FROM system_settings")
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch settings")?;
        Ok(rows.into_iter().collect())
    }

    pub async fn set_many(&self, settings: &HashMap<String, String>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (key, value) in settings {
            sqlx::query(
                "INSERT INTO system_settings (setting_key, value) VALUES ($1, $2)
                 ON CONFLICT (setting_key)
                 DO UPDATE SET value = excluded.value, updated_at = now()",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert setting")?;
        }

        tx.commit().await.context("Failed to commit settings")?;
        Ok(())
    }
}
