use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use linkstrip_db::KeyError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Boundary error: everything a handler can fail with, mapped onto a status
/// code and a client-safe message. Internal detail is logged, never sent.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not signed in")]
    Unauthorized,

    #[error("no permission to perform this action")]
    Forbidden,

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("upstream resolver failed: {0}")]
    Upstream(String),

    #[error("{0}")]
    BadRequest(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not signed in".into()),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "No permission to perform this action".into(),
            ),
            ApiError::Key(KeyError::InvalidToken) => (
                StatusCode::UNAUTHORIZED,
                "API token is invalid".into(),
            ),
            ApiError::Key(KeyError::Expired) => (
                StatusCode::UNAUTHORIZED,
                "API token has expired, please renew".into(),
            ),
            ApiError::Key(KeyError::QuotaExhausted) => (
                StatusCode::FORBIDDEN,
                "Quota is used up, please top up".into(),
            ),
            ApiError::Key(KeyError::NotFound) => (StatusCode::NOT_FOUND, "Not found".into()),
            ApiError::Key(KeyError::InvalidArgument(msg)) => {
                (StatusCode::BAD_REQUEST, (*msg).into())
            }
            ApiError::Key(KeyError::Conflict) | ApiError::Key(KeyError::Database(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong, please try again later".into(),
            ),
            ApiError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "Parse failed, please try another channel".into(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, (*msg).into()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong, please try again later".into(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("request failed: {:?}", self);
        }
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_and_expiry_are_distinguishable_to_clients() {
        // The client routes the user to "top up" vs "renew" based on the
        // status code, so these must not collapse into one.
        let (exhausted, _) = ApiError::Key(KeyError::QuotaExhausted).status_and_message();
        let (expired, _) = ApiError::Key(KeyError::Expired).status_and_message();
        assert_eq!(exhausted, StatusCode::FORBIDDEN);
        assert_eq!(expired, StatusCode::UNAUTHORIZED);
        assert_ne!(exhausted, expired);
    }

    #[test]
    fn infrastructure_detail_is_not_leaked() {
        let err = ApiError::Key(KeyError::Database(sqlx::Error::PoolTimedOut));
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.to_lowercase().contains("pool"));
    }
}
