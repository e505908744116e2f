use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use linkstrip_db::models::usage_log::UsageLogWithUser;
use linkstrip_db::repositories::usage_log_repo::UsageLogRepository;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;
use crate::services::cache;

const LOGS_CACHE_TTL: u64 = 300;

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Serialize, Deserialize)]
struct LogsPage {
    logs: Vec<UsageLogWithUser>,
    total: i64,
}

/// GET /api/admin/usage-logs?page&limit — today's ledger, paged. Cached per
/// page; the ledger only grows, so a stale page is at worst missing the
/// newest rows.
pub async fn list_usage_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let cache_key = format!("admin:usage-logs:{page}:{limit}");

    if let Some(cached) = cache::get_json::<LogsPage>(state.cache.as_ref(), &cache_key).await {
        return Ok(Json(
            json!({ "success": true, "logs": cached.logs, "total": cached.total }),
        ));
    }

    let repo = UsageLogRepository::new(state.pool.clone());
    let logs = repo
        .today_paged(limit, (page - 1) * limit)
        .await
        .map_err(ApiError::Internal)?;
    let total = repo.count_all().await.map_err(ApiError::Internal)?;

    let result = LogsPage { logs, total };
    cache::put_json(state.cache.as_ref(), &cache_key, &result, LOGS_CACHE_TTL).await;

    Ok(Json(
        json!({ "success": true, "logs": result.logs, "total": result.total }),
    ))
}
