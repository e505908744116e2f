use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;
use crate::session::Claims;

#[derive(Deserialize)]
pub struct RoleChangeRequest {
    pub email: String,
}

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .user_service
        .list_with_keys()
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(json!({ "success": true, "users": users })))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.delete(claims.user_id, id).await?;
    Ok(Json(json!({ "success": true, "message": "Account deleted" })))
}

/// POST /api/admin/users/promote — super-admin only.
pub async fn promote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RoleChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .user_service
        .set_role(&claims.email, req.email.trim(), "admin")
        .await?;
    Ok(Json(json!({ "success": true, "message": "Account is now an admin" })))
}

/// POST /api/admin/users/demote — super-admin only; the super-admin itself
/// cannot be demoted.
pub async fn demote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RoleChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .user_service
        .set_role(&claims.email, req.email.trim(), "user")
        .await?;
    Ok(Json(json!({ "success": true, "message": "Admin role revoked" })))
}
