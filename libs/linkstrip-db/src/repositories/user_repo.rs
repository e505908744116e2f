use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::user::{User, UserWithKeys};

const USER_COLUMNS: &str = "id, email, password_hash, display_name, role, created_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
        role: &str,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, display_name, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create user")?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by ID")?;
        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;
        Ok(user)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(count)
    }

    pub async fn set_role(&self, email: &str, role: &str) -> Result<bool> {
        let res = sqlx::query("UPDATE users SET role = $1, updated_at = now() WHERE email = $2")
            .bind(role)
            .bind(email)
            .execute(&self.pool)
            .await
            .context("Failed to update user role")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn set_password_hash(&self, email: &str, password_hash: &str) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = now() WHERE email = $2",
        )
        .bind(password_hash)
        .bind(email)
        .execute(&self.pool)
        .await
        .context("Failed to update password hash")?;
        Ok(res.rows_affected() > 0)
    }

    /// Deleting an account cascades to its keys, and from there to their
    /// ledger rows.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(res.rows_affected() > 0)
    }

    /// Admin listing: every account with a rollup of its keys and traffic.
    pub async fn list_with_keys(&self) -> Result<Vec<UserWithKeys>> {
        let users = sqlx::query_as::<_, UserWithKeys>(
            "SELECT
                u.id, u.email, u.display_name, u.role, u.created_at,
                (SELECT MAX(expires_at) FROM api_keys ak WHERE ak.user_id = u.id) AS api_expires,
                (SELECT COUNT(*) FROM api_keys ak WHERE ak.user_id = u.id) AS key_count,
                (SELECT COUNT(*)
                   FROM usage_logs ul
                   JOIN api_keys ak ON ul.token = ak.token
                  WHERE ak.user_id = u.id) AS total_requests
             FROM users u
             ORDER BY u.id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch users with key rollup")?;
        Ok(users)
    }
}
