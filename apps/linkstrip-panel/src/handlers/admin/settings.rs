use std::collections::HashMap;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;

/// GET /api/admin/settings
pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let settings = state
        .settings_service
        .get_all()
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(json!({ "success": true, "settings": settings })))
}

/// PUT /api/admin/settings — upserts the known keys, drops the cached copy.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .settings_service
        .update(settings)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(json!({ "success": true, "message": "Settings saved" })))
}
