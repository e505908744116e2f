use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct ConsumeRequest {
    pub token: String,
    #[serde(default)]
    pub request_url: Option<String>,
}

/// POST /api/keys/verify — read-only check so the client can enable the
/// parse action. The consume path re-validates under its row lock, so this
/// result is advisory by design of the caller, not a reservation.
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.token.trim().is_empty() {
        return Err(ApiError::BadRequest("Please provide an API token"));
    }

    let status = state.key_service.verify(req.token.trim()).await?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "remaining": status.remaining,
            "plan": status.plan,
            "expires_at": status.expires_at,
        }
    })))
}

/// POST /api/usage/consume — one metered unit: atomic check, decrement and
/// ledger append, returning the new balance.
pub async fn consume(
    State(state): State<AppState>,
    Json(req): Json<ConsumeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.token.trim().is_empty() {
        return Err(ApiError::BadRequest("Please provide an API token"));
    }

    let remaining = state
        .key_service
        .consume(req.token.trim(), req.request_url.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": { "remaining": remaining }
    })))
}
