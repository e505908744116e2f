use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use axum_extra::extract::cookie::CookieJar;
use linkstrip_db::models::api_key::ApiKey;
use linkstrip_db::models::user::User;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;
use crate::session;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn profile_json(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "email": user.email,
        "name": user.display_name.clone().unwrap_or_default(),
        "role": user.role,
    })
}

fn key_json(key: &ApiKey) -> serde_json::Value {
    json!({
        "token": key.token,
        "plan": key.plan,
        "remaining": key.remaining_quota,
        "expires_at": key.expires_at,
    })
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, trial_key) = state
        .user_service
        .register(&req.email, &req.password, req.name.as_deref())
        .await?;

    let token = session::issue(&state.jwt_secret, &user)?;
    let body = Json(json!({
        "success": true,
        "user": profile_json(&user),
        "api_key": trial_key.as_ref().map(key_json),
    }));

    Ok((jar.add(session::session_cookie(token)), body))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, key) = state.user_service.login(&req.email, &req.password).await?;

    let token = session::issue(&state.jwt_secret, &user)?;
    let body = Json(json!({
        "success": true,
        "user": profile_json(&user),
        "api_key": key.as_ref().map(key_json),
    }));

    Ok((jar.add(session::session_cookie(token)), body))
}

/// POST /api/auth/logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(session::clear_session_cookie()),
        Json(json!({ "success": true })),
    )
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let claims = session::authenticate(&jar, &state.jwt_secret)?;

    // The cookie may outlive the account; re-check the store.
    let user = state
        .user_service
        .get_by_id(claims.user_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(json!({ "success": true, "user": profile_json(&user) })))
}
