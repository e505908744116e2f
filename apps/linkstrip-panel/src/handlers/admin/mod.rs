pub mod api_keys;
pub mod settings;
pub mod stats;
pub mod usage_logs;
pub mod users;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;
use crate::error::ApiError;
use crate::session;

/// Everything nested under /api/admin goes through here. Non-admins get the
/// same generic forbidden response regardless of what they were aiming at.
pub async fn admin_guard(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = session::authenticate(&jar, &state.jwt_secret)?;
    if !claims.is_admin() {
        return Err(ApiError::Forbidden);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
