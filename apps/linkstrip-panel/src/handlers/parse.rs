use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;
use crate::services::resolver_service::Channel;

#[derive(Deserialize)]
pub struct ParseRequest {
    pub token: String,
    pub url: String,
    #[serde(default)]
    pub channel: Option<String>,
}

/// POST /api/parse — the public product surface. Exactly one quota unit is
/// consumed per parse, atomically, before the resolver runs; an upstream
/// failure after the commit is not refunded.
pub async fn parse(
    State(state): State<AppState>,
    Json(req): Json<ParseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("Please provide an API token"));
    }

    let share_url = req.url.trim();
    let parsed = url::Url::parse(share_url)
        .map_err(|_| ApiError::BadRequest("Please provide a valid share link"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest("Please provide a valid share link"));
    }

    let channel = match req.channel.as_deref() {
        None | Some("") => Channel::Direct,
        Some(name) => {
            Channel::parse(name).ok_or(ApiError::BadRequest("Unknown parse channel"))?
        }
    };

    let remaining = state.key_service.consume(token, Some(share_url)).await?;
    info!(channel = channel_name(channel), remaining, "parse accepted");

    let media = state.resolver.resolve(channel, share_url).await?;

    Ok(Json(json!({
        "success": true,
        "data": media,
        "quota": { "remaining": remaining }
    })))
}

fn channel_name(channel: Channel) -> &'static str {
    match channel {
        Channel::Direct => "direct",
        Channel::General => "general",
        Channel::Partner => "partner",
    }
}
