use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;

/// GET /api/admin/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .stats_service
        .admin_stats()
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}
