use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use linkstrip_db::models::api_key::Plan;
use linkstrip_db::token::DEFAULT_TOKEN_LEN;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateKeyRequest {
    pub user_id: i64,
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub expiry_days: Option<i64>,
    #[serde(default)]
    pub total_quota: Option<i32>,
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Deserialize)]
pub struct RenewRequest {
    pub days: i64,
    #[serde(default)]
    pub add_quota: i32,
}

#[derive(Deserialize)]
pub struct AddQuotaRequest {
    pub amount: i32,
}

/// GET /api/admin/keys
pub async fn list_keys(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let keys = state.key_service.list_with_usage().await?;
    Ok(Json(json!({ "success": true, "keys": keys })))
}

/// POST /api/admin/keys
pub async fn create_key(
    State(state): State<AppState>,
    Json(req): Json<CreateKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = match req.plan.as_deref() {
        None | Some("") => Plan::Basic,
        Some(name) => Plan::parse(name).ok_or(ApiError::BadRequest("Unknown plan"))?,
    };

    let key = state
        .key_service
        .create(
            req.user_id,
            req.length.unwrap_or(DEFAULT_TOKEN_LEN),
            req.expiry_days.unwrap_or(30),
            req.total_quota.unwrap_or(1000),
            plan,
        )
        .await?;

    Ok(Json(json!({ "success": true, "api_key": key })))
}

/// POST /api/admin/keys/{id}/renew
pub async fn renew_key(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<RenewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key = state.key_service.renew(id, req.days, req.add_quota).await?;
    Ok(Json(json!({ "success": true, "api_key": key })))
}

/// POST /api/admin/keys/{id}/quota
pub async fn add_quota(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AddQuotaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key = state.key_service.add_quota(id, req.amount).await?;
    Ok(Json(json!({ "success": true, "api_key": key })))
}

/// DELETE /api/admin/keys/{id}
pub async fn delete_key(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.key_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
