use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::warn;

use crate::error::KeyError;
use crate::models::api_key::{ApiKey, ApiKeyWithUsage, KeyStatus, Plan};
use crate::token::{MAX_TOKEN_LEN, MIN_TOKEN_LEN, generate_token};

const KEY_COLUMNS: &str =
    "id, token, user_id, plan, total_quota, remaining_quota, expires_at, created_at";

/// Fresh tokens tried before a collision becomes a hard `Conflict` failure.
const CREATE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Issue a new key. The token comes from the CSPRNG; a UNIQUE collision
    /// on insert is regenerated a bounded number of times and then surfaced
    /// as `Conflict` rather than a raw constraint error.
    pub async fn create(
        &self,
        user_id: i64,
        token_len: usize,
        expiry_days: i64,
        total_quota: i32,
        plan: Plan,
    ) -> Result<ApiKey, KeyError> {
        if expiry_days <= 0 {
            return Err(KeyError::InvalidArgument("expiry_days must be positive"));
        }
        if total_quota <= 0 {
            return Err(KeyError::InvalidArgument("total_quota must be positive"));
        }
        if !(MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&token_len) {
            return Err(KeyError::InvalidArgument("token length out of range"));
        }

        let expires_at = Utc::now() + Duration::days(expiry_days);

        for attempt in 0..CREATE_ATTEMPTS {
            let token = generate_token(token_len);
            let res = sqlx::query_as::<_, ApiKey>(&format!(
                "INSERT INTO api_keys (token, user_id, plan, total_quota, remaining_quota, expires_at)
                 VALUES ($1, $2, $3, $4, $4, $5)
                 RETURNING {KEY_COLUMNS}"
            ))
            .bind(&token)
            .bind(user_id)
            .bind(plan.as_str())
            .bind(total_quota)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await;

            match res {
                Ok(key) => return Ok(key),
                Err(e) if KeyError::is_unique_violation(&e) => {
                    warn!(attempt, "generated API token collided, regenerating");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(KeyError::Conflict)
    }

    /// Atomically test-and-decrement one quota unit and append the ledger
    /// row, returning the new balance.
    ///
    /// The whole check runs inside one transaction holding a `FOR UPDATE`
    /// row lock on the key, so concurrent callers against the same token are
    /// linearized and the balance can never go negative. Every early return
    /// drops the `Transaction`, which rolls back and releases the lock and
    /// connection.
    pub async fn consume(
        &self,
        token: &str,
        request_url: Option<&str>,
        response_status: i32,
    ) -> Result<i32, KeyError> {
        let mut tx = self.pool.begin().await?;

        let key: Option<ApiKey> = sqlx::query_as(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE token = $1 FOR UPDATE"
        ))
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let key = key.ok_or(KeyError::InvalidToken)?;
        if key.is_expired(Utc::now()) {
            return Err(KeyError::Expired);
        }
        if key.remaining_quota <= 0 {
            return Err(KeyError::QuotaExhausted);
        }

        sqlx::query(
            "UPDATE api_keys
             SET remaining_quota = remaining_quota - 1, updated_at = now()
             WHERE id = $1",
        )
        .bind(key.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO usage_logs (token, user_id, request_url, response_status)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(token)
        .bind(key.user_id)
        .bind(request_url)
        .bind(response_status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(key.remaining_quota - 1)
    }

    /// Pure read used before showing the parse action. Performs the same
    /// checks as `consume` but mutates nothing; `consume` re-validates under
    /// the row lock, so a stale answer here is harmless.
    pub async fn verify(&self, token: &str) -> Result<KeyStatus, KeyError> {
        let key: Option<ApiKey> =
            sqlx::query_as(&format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE token = $1"))
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        let key = key.ok_or(KeyError::InvalidToken)?;
        if key.is_expired(Utc::now()) {
            return Err(KeyError::Expired);
        }
        if key.remaining_quota <= 0 {
            return Err(KeyError::QuotaExhausted);
        }

        Ok(KeyStatus {
            remaining: key.remaining_quota,
            plan: key.plan,
            expires_at: key.expires_at,
        })
    }

    /// Extend the expiry from whichever is later, the current expiry or now,
    /// and optionally grant quota to both counters at once.
    pub async fn renew(&self, key_id: i64, days: i64, add_quota: i32) -> Result<ApiKey, KeyError> {
        if days <= 0 {
            return Err(KeyError::InvalidArgument("days must be positive"));
        }
        if add_quota < 0 {
            return Err(KeyError::InvalidArgument("add_quota must not be negative"));
        }

        let key: Option<ApiKey> = sqlx::query_as(&format!(
            "UPDATE api_keys
             SET expires_at = GREATEST(expires_at, now()) + make_interval(days => $1),
                 total_quota = total_quota + $2,
                 remaining_quota = remaining_quota + $2,
                 updated_at = now()
             WHERE id = $3
             RETURNING {KEY_COLUMNS}"
        ))
        .bind(days as i32)
        .bind(add_quota)
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await?;

        key.ok_or(KeyError::NotFound)
    }

    /// Top up quota without touching the expiry. Grants to both counters so
    /// the consumed amount (`total - remaining`) stays constant.
    pub async fn add_quota(&self, key_id: i64, amount: i32) -> Result<ApiKey, KeyError> {
        if amount <= 0 {
            return Err(KeyError::InvalidArgument("amount must be positive"));
        }

        let key: Option<ApiKey> = sqlx::query_as(&format!(
            "UPDATE api_keys
             SET total_quota = total_quota + $1,
                 remaining_quota = remaining_quota + $1,
                 updated_at = now()
             WHERE id = $2
             RETURNING {KEY_COLUMNS}"
        ))
        .bind(amount)
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await?;

        key.ok_or(KeyError::NotFound)
    }

    /// Remove a key. Its ledger rows go with it via the FK cascade.
    pub async fn delete(&self, key_id: i64) -> Result<(), KeyError> {
        let res = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Err(KeyError::NotFound);
        }
        Ok(())
    }

    pub async fn get_by_id(&self, key_id: i64) -> Result<Option<ApiKey>, KeyError> {
        let key = sqlx::query_as(&format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE id = $1"))
            .bind(key_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(key)
    }

    /// Newest still-active key owned by an account, for the login response.
    pub async fn newest_active_for_user(&self, user_id: i64) -> Result<Option<ApiKey>, KeyError> {
        let key = sqlx::query_as(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys
             WHERE user_id = $1 AND expires_at > now()
             ORDER BY expires_at DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    /// Admin listing: every key joined to its owner and its ledger count.
    pub async fn list_with_usage(&self) -> Result<Vec<ApiKeyWithUsage>, KeyError> {
        let keys = sqlx::query_as::<_, ApiKeyWithUsage>(
            "SELECT
                ak.id, ak.token, ak.user_id, u.email AS user_email,
                ak.plan, ak.total_quota, ak.remaining_quota,
                ak.expires_at, ak.created_at,
                (SELECT COUNT(*) FROM usage_logs ul WHERE ul.token = ak.token) AS total_requests
             FROM api_keys ak
             LEFT JOIN users u ON ak.user_id = u.id
             ORDER BY ak.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }
}

pub fn renewed_expiry(current: DateTime<Utc>, now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    current.max(now) + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    // DB-free mirror of the SQL GREATEST(expires_at, now()) + interval rule.
    #[test]
    fn renewal_extends_from_now_when_already_expired() {
        let now = Utc::now();
        let expired = now - Duration::days(5);
        assert_eq!(renewed_expiry(expired, now, 10), now + Duration::days(10));
    }

    #[test]
    fn renewal_extends_from_future_expiry() {
        let now = Utc::now();
        let future = now + Duration::days(20);
        assert_eq!(
            renewed_expiry(future, now, 10),
            now + Duration::days(30)
        );
    }
}
