use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;

/// GET /api/settings — public site copy (tutorial, FAQ, announcement,
/// contact email).
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state
        .settings_service
        .get_public()
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(json!({ "success": true, "settings": settings })))
}
