use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use linkstrip_db::models::user::User;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "token";
const SESSION_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub role: String,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

pub fn issue(secret: &str, user: &User) -> Result<String, ApiError> {
    let claims = Claims {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role.clone(),
        exp: (Utc::now() + Duration::days(SESSION_DAYS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to sign session token: {e}")))
}

pub fn verify(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .ok()
}

/// Pull the signed session out of the cookie jar. Missing, expired and
/// tampered cookies all collapse into `Unauthorized`.
pub fn authenticate(jar: &CookieJar, secret: &str) -> Result<Claims, ApiError> {
    let cookie = jar.get(SESSION_COOKIE).ok_or(ApiError::Unauthorized)?;
    verify(secret, cookie.value()).ok_or(ApiError::Unauthorized)
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_DAYS))
        .build()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::seconds(0))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user(role: &str) -> User {
        User {
            id: 7,
            email: "user@example.com".into(),
            password_hash: "x".into(),
            display_name: Some("User".into()),
            role: role.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn session_round_trips_identity_and_role() {
        let token = issue("secret", &test_user("admin")).unwrap();
        let claims = verify("secret", &token).expect("token should verify");
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "user@example.com");
        assert!(claims.is_admin());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue("secret", &test_user("user")).unwrap();
        assert!(verify("other-secret", &token).is_none());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify("secret", "not-a-jwt").is_none());
    }
}
