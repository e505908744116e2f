use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Which third-party backend to ask. The channels differ in coverage and
/// stability, so the client lets the user switch when one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Direct,
    General,
    Partner,
}

impl Channel {
    pub fn parse(s: &str) -> Option<Channel> {
        match s {
            "direct" | "1" => Some(Channel::Direct),
            "general" | "2" => Some(Channel::General),
            "partner" | "3" => Some(Channel::Partner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Images,
}

/// The one shape the frontend knows, whatever the backend returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMedia {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub direct_url: String,
    pub general_url: String,
    pub partner_url: String,
    pub partner_uid: String,
    pub partner_key: String,
}

impl ResolverConfig {
    pub fn from_env() -> Self {
        Self {
            direct_url: std::env::var("RESOLVER_DIRECT_URL").unwrap_or_default(),
            general_url: std::env::var("RESOLVER_GENERAL_URL").unwrap_or_default(),
            partner_url: std::env::var("RESOLVER_PARTNER_URL").unwrap_or_default(),
            partner_uid: std::env::var("RESOLVER_PARTNER_UID").unwrap_or_default(),
            partner_key: std::env::var("RESOLVER_PARTNER_KEY").unwrap_or_default(),
        }
    }
}

pub struct ResolverService {
    http: reqwest::Client,
    cfg: ResolverConfig,
}

impl ResolverService {
    pub fn new(cfg: ResolverConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(BROWSER_UA)
            .build()
            .unwrap_or_default();
        Self { http, cfg }
    }

    /// Ask the selected backend to resolve a share link. Adapters only talk
    /// HTTP; quota accounting happened before we were called.
    pub async fn resolve(&self, channel: Channel, url: &str) -> Result<ParsedMedia, ApiError> {
        match channel {
            Channel::Direct => self.resolve_direct(url).await,
            Channel::General => self.resolve_general(url).await,
            Channel::Partner => self.resolve_partner(url).await,
        }
    }

    async fn fetch_json(&self, request_url: &str, referer: Option<&str>) -> Result<Value, ApiError> {
        let mut req = self.http.get(request_url).header("Accept", "application/json");
        if let Some(referer) = referer {
            req = req.header("Referer", referer);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "resolver backend returned an error status");
            return Err(ApiError::Upstream(format!("backend status {status}")));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ApiError::Upstream(format!("backend returned invalid JSON: {e}")))
    }

    async fn resolve_direct(&self, url: &str) -> Result<ParsedMedia, ApiError> {
        if self.cfg.direct_url.is_empty() {
            return Err(ApiError::Upstream("direct channel is not configured".into()));
        }
        let request_url = format!("{}?url={}", self.cfg.direct_url, urlencode(url));
        debug!(channel = "direct", "dispatching parse request");
        let body = self.fetch_json(&request_url, Some(&self.cfg.direct_url)).await?;
        reshape_direct(&body)
    }

    async fn resolve_general(&self, url: &str) -> Result<ParsedMedia, ApiError> {
        if self.cfg.general_url.is_empty() {
            return Err(ApiError::Upstream("general channel is not configured".into()));
        }
        let request_url = format!("{}?url={}", self.cfg.general_url, urlencode(url));
        debug!(channel = "general", "dispatching parse request");
        let body = self.fetch_json(&request_url, None).await?;
        reshape_general(&body)
    }

    async fn resolve_partner(&self, url: &str) -> Result<ParsedMedia, ApiError> {
        if self.cfg.partner_url.is_empty() {
            return Err(ApiError::Upstream("partner channel is not configured".into()));
        }
        let request_url = format!(
            "{}/?uid={}&my={}&url={}",
            self.cfg.partner_url,
            urlencode(&self.cfg.partner_uid),
            urlencode(&self.cfg.partner_key),
            urlencode(url)
        );
        debug!(channel = "partner", "dispatching parse request");
        let body = self.fetch_json(&request_url, None).await?;
        reshape_partner(&body)
    }
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Direct backend: `{code: 200, data: {title, author, cover, url}}`.
fn reshape_direct(body: &Value) -> Result<ParsedMedia, ApiError> {
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
    if code != 200 {
        let msg = str_field(body, "msg").unwrap_or("parse failed");
        return Err(ApiError::Upstream(msg.to_string()));
    }
    let data = body
        .get("data")
        .ok_or_else(|| ApiError::Upstream("response is missing data".into()))?;

    let video_url = str_field(data, "url").map(str::to_string);
    if video_url.is_none() {
        return Err(ApiError::Upstream("response carries no media URL".into()));
    }

    Ok(ParsedMedia {
        title: str_field(data, "title").unwrap_or_default().to_string(),
        author: str_field(data, "author").map(str::to_string),
        kind: MediaKind::Video,
        video_url,
        cover_url: str_field(data, "cover").map(str::to_string),
        images: Vec::new(),
    })
}

/// General backend: `{success, data: {video_title, video_url, download_url,
/// image_url}}`. A response with only an image URL is an image post.
fn reshape_general(body: &Value) -> Result<ParsedMedia, ApiError> {
    if !body.get("success").and_then(Value::as_bool).unwrap_or(false) {
        let msg = str_field(body, "msg").unwrap_or("parse failed");
        return Err(ApiError::Upstream(msg.to_string()));
    }
    let data = body
        .get("data")
        .ok_or_else(|| ApiError::Upstream("response is missing data".into()))?;

    let title = str_field(data, "video_title").unwrap_or_default().to_string();
    let image_url = str_field(data, "image_url").map(str::to_string);
    // Prefer the watermark-free download URL when the backend offers both.
    let video_url = str_field(data, "download_url")
        .or_else(|| str_field(data, "video_url"))
        .map(str::to_string);

    match (video_url, image_url) {
        (Some(video_url), image) => Ok(ParsedMedia {
            title,
            author: None,
            kind: MediaKind::Video,
            video_url: Some(video_url),
            cover_url: image,
            images: Vec::new(),
        }),
        (None, Some(image)) => Ok(ParsedMedia {
            title,
            author: None,
            kind: MediaKind::Images,
            video_url: None,
            cover_url: Some(image.clone()),
            images: vec![image],
        }),
        (None, None) => Err(ApiError::Upstream("response carries no media URL".into())),
    }
}

/// Partner backend already speaks the unified envelope:
/// `{code: 0, data: {title, type: "1"|"2", video_url, cover_url, pics}}`.
fn reshape_partner(body: &Value) -> Result<ParsedMedia, ApiError> {
    if body.get("code").and_then(Value::as_i64) != Some(0) {
        let msg = str_field(body, "msg").unwrap_or("parse failed");
        return Err(ApiError::Upstream(msg.to_string()));
    }
    let data = body
        .get("data")
        .ok_or_else(|| ApiError::Upstream("response is missing data".into()))?;

    let images: Vec<String> = data
        .get("pics")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let kind = if data.get("type").and_then(Value::as_str) == Some("2") || !images.is_empty() {
        MediaKind::Images
    } else {
        MediaKind::Video
    };

    let video_url = str_field(data, "video_url").map(str::to_string);
    if kind == MediaKind::Video && video_url.is_none() {
        return Err(ApiError::Upstream("response carries no media URL".into()));
    }

    Ok(ParsedMedia {
        title: str_field(data, "title").unwrap_or_default().to_string(),
        author: str_field(data, "author").map(str::to_string),
        kind,
        video_url,
        cover_url: str_field(data, "cover_url").map(str::to_string),
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_names_and_legacy_numbers_parse() {
        assert_eq!(Channel::parse("direct"), Some(Channel::Direct));
        assert_eq!(Channel::parse("2"), Some(Channel::General));
        assert_eq!(Channel::parse("partner"), Some(Channel::Partner));
        assert_eq!(Channel::parse("magic"), None);
    }

    #[test]
    fn direct_reshapes_video_payload() {
        let body = json!({
            "code": 200,
            "data": {
                "title": "cat video",
                "author": "cat",
                "cover": "https://cdn.example/cover.jpg",
                "url": "https://cdn.example/clean.mp4"
            }
        });
        let media = reshape_direct(&body).unwrap();
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(media.title, "cat video");
        assert_eq!(media.video_url.as_deref(), Some("https://cdn.example/clean.mp4"));
        assert_eq!(media.author.as_deref(), Some("cat"));
    }

    #[test]
    fn direct_error_code_surfaces_backend_message() {
        let body = json!({ "code": 500, "msg": "link not supported" });
        let err = reshape_direct(&body).unwrap_err();
        assert!(matches!(err, ApiError::Upstream(m) if m == "link not supported"));
    }

    #[test]
    fn general_prefers_download_url_over_video_url() {
        let body = json!({
            "success": true,
            "data": {
                "video_title": "t",
                "video_url": "https://cdn.example/marked.mp4",
                "download_url": "https://cdn.example/clean.mp4"
            }
        });
        let media = reshape_general(&body).unwrap();
        assert_eq!(media.video_url.as_deref(), Some("https://cdn.example/clean.mp4"));
    }

    #[test]
    fn general_image_only_payload_becomes_image_post() {
        let body = json!({
            "success": true,
            "data": { "video_title": "pic", "image_url": "https://cdn.example/p.jpg" }
        });
        let media = reshape_general(&body).unwrap();
        assert_eq!(media.kind, MediaKind::Images);
        assert_eq!(media.images, vec!["https://cdn.example/p.jpg".to_string()]);
        assert!(media.video_url.is_none());
    }

    #[test]
    fn partner_gallery_payload_keeps_all_pictures() {
        let body = json!({
            "code": 0,
            "data": {
                "title": "gallery",
                "type": "2",
                "pics": ["https://cdn.example/1.jpg", "https://cdn.example/2.jpg"]
            }
        });
        let media = reshape_partner(&body).unwrap();
        assert_eq!(media.kind, MediaKind::Images);
        assert_eq!(media.images.len(), 2);
    }

    #[test]
    fn media_without_any_url_is_an_upstream_error() {
        let body = json!({ "success": true, "data": { "video_title": "empty" } });
        assert!(reshape_general(&body).is_err());
    }
}
