use std::sync::Arc;

use anyhow::{Context, Result};
use linkstrip_db::models::api_key::{ApiKey, Plan};
use linkstrip_db::models::user::{User, UserWithKeys};
use linkstrip_db::repositories::user_repo::UserRepository;
use sqlx::PgPool;
use tracing::info;

use super::cache::{self, Cache};
use super::key_service::KeyService;
use super::stats_service::STATS_CACHE_KEY;
use crate::error::ApiError;

pub const USERS_CACHE_KEY: &str = "admin:users";
const USERS_CACHE_TTL: u64 = 300;

const TRIAL_KEY_DAYS: i64 = 30;

pub struct UserService {
    repo: UserRepository,
    cache: Arc<dyn Cache>,
    keys: Arc<KeyService>,
    super_admin_email: String,
    trial_quota: i32,
}

impl UserService {
    pub fn new(
        pool: PgPool,
        cache: Arc<dyn Cache>,
        keys: Arc<KeyService>,
        super_admin_email: String,
        trial_quota: i32,
    ) -> Self {
        Self {
            repo: UserRepository::new(pool),
            cache,
            keys,
            super_admin_email,
            trial_quota,
        }
    }

    async fn invalidate_listings(&self) {
        cache::drop_key(self.cache.as_ref(), USERS_CACHE_KEY).await;
        cache::drop_key(self.cache.as_ref(), STATS_CACHE_KEY).await;
    }

    /// Create an account and auto-issue its trial key. The very first
    /// account on a fresh install becomes admin.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<(User, Option<ApiKey>), ApiError> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(ApiError::BadRequest("Please enter a valid email address"));
        }
        if password.len() < 6 {
            return Err(ApiError::BadRequest(
                "Password must be at least 6 characters",
            ));
        }

        if self
            .repo
            .get_by_email(&email)
            .await
            .context("register lookup failed")?
            .is_some()
        {
            return Err(ApiError::BadRequest("This email is already registered"));
        }

        let role = if self.repo.count().await.context("user count failed")? == 0 {
            "admin"
        } else {
            "user"
        };

        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .context("failed to hash password")?;

        let user = self
            .repo
            .create(&email, &hash, display_name, role)
            .await
            .context("failed to create account")?;
        info!(user_id = user.id, role, "registered account");

        // Trial key issuance is best-effort: the account stands even if the
        // key insert loses a race.
        let trial = self
            .keys
            .create(
                user.id,
                linkstrip_db::token::DEFAULT_TOKEN_LEN,
                TRIAL_KEY_DAYS,
                self.trial_quota,
                Plan::Basic,
            )
            .await
            .ok();

        self.invalidate_listings().await;
        Ok((user, trial))
    }

    /// Password check plus the account's newest usable key for the client
    /// to pre-fill.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, Option<ApiKey>), ApiError> {
        let user = self
            .repo
            .get_by_email(email.trim().to_lowercase().as_str())
            .await
            .context("login lookup failed")?;

        // Same rejection whether the account is missing or the password is
        // wrong; no account probing.
        let user = match user {
            Some(u) if bcrypt::verify(password, &u.password_hash).unwrap_or(false) => u,
            _ => return Err(ApiError::BadRequest("Wrong email or password")),
        };

        let key = self.keys.newest_active_for_user(user.id).await?;

        Ok((user, key))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        self.repo.get_by_id(id).await
    }

    /// Admin listing with key rollups, cache-aside.
    pub async fn list_with_keys(&self) -> Result<Vec<UserWithKeys>> {
        if let Some(users) =
            cache::get_json::<Vec<UserWithKeys>>(self.cache.as_ref(), USERS_CACHE_KEY).await
        {
            return Ok(users);
        }

        let users = self.repo.list_with_keys().await?;
        cache::put_json(self.cache.as_ref(), USERS_CACHE_KEY, &users, USERS_CACHE_TTL).await;
        Ok(users)
    }

    /// Only the configured super-admin may grant or revoke the admin role,
    /// and the super-admin itself can never be demoted.
    pub async fn set_role(
        &self,
        acting_email: &str,
        target_email: &str,
        role: &str,
    ) -> Result<(), ApiError> {
        if acting_email != self.super_admin_email {
            return Err(ApiError::Forbidden);
        }
        if target_email == self.super_admin_email && role != "admin" {
            return Err(ApiError::Forbidden);
        }

        let updated = self
            .repo
            .set_role(target_email, role)
            .await
            .context("failed to update role")?;
        if !updated {
            return Err(ApiError::Key(linkstrip_db::KeyError::NotFound));
        }

        info!(target_email, role, "changed account role");
        self.invalidate_listings().await;
        Ok(())
    }

    pub async fn delete(&self, acting_user_id: i64, target_id: i64) -> Result<(), ApiError> {
        if acting_user_id == target_id {
            return Err(ApiError::BadRequest("You cannot delete your own account"));
        }

        let deleted = self
            .repo
            .delete(target_id)
            .await
            .context("failed to delete account")?;
        if !deleted {
            return Err(ApiError::Key(linkstrip_db::KeyError::NotFound));
        }

        info!(target_id, "deleted account");
        self.invalidate_listings().await;
        cache::drop_key(self.cache.as_ref(), super::key_service::KEYS_CACHE_KEY).await;
        Ok(())
    }
}
