use crate::{
    account::AccountKey,
    api::{
        error::ApiError,
        response::{ok, ApiResponse, RegionPayload},
        ws,
    },
    db::trust,
    models::{CacheStats, ProfileResult, RegionResult},
    queue::QueueStatus,
    service::LookupOptions,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub account: String,
    #[serde(default)]
    pub keep_artifact: bool,
    #[serde(default)]
    pub priority: bool,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Deserialize)]
pub struct MaxConcurrentRequest {
    pub value: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsPayload {
    region: CacheDomainStats,
    profile: CacheDomainStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheDomainStats {
    #[serde(flatten)]
    counts: CacheStats,
    expiry_days: i64,
}

// Create router with all routes
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(query_region))
        .route("/queue/status", get(queue_status))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/region/{account}", get(get_cached_region))
        .route("/cache/region/{account}", delete(remove_cached_region))
        .route("/cache/region", delete(clear_region_cache))
        .route("/cache/profile/{account}", get(get_cached_profile))
        .route("/cache/profile/{account}", put(put_cached_profile))
        .route("/cache/profile", delete(clear_profile_cache))
        .route("/trust", get(list_trust))
        .route("/trust", delete(clear_trust))
        .route("/trust/stats", get(trust_stats))
        .route("/trust/{account}", post(add_trust))
        .route("/trust/{account}", delete(remove_trust))
        .route("/settings/max-concurrent", post(set_max_concurrent))
        .route("/ws/panel", get(ws::panel_handler))
        .route("/ws/page", get(ws::page_handler))
        .layer(cors)
        .with_state(app_state)
}

// POST /query handler
async fn query_region(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<ApiResponse<RegionPayload>>, ApiError> {
    info!(account = %request.account, priority = request.priority, "processing lookup request");

    let options = LookupOptions {
        keep_artifact: request.keep_artifact,
        priority: request.priority,
        force_refresh: request.force_refresh,
    };
    let result = state
        .coordinator
        .lookup_region(&request.account, options)
        .await
        .map_err(ApiError::from)?;

    match result {
        RegionResult::RateLimited => Err(ApiError::RateLimited),
        RegionResult::SelfAccount => Err(ApiError::SelfAccount),
        other => Ok(ok(RegionPayload::resolved(&other))),
    }
}

// GET /cache/region/{account} handler: read-only, never triggers automation
async fn get_cached_region(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<Json<ApiResponse<RegionPayload>>, ApiError> {
    let cached = state
        .coordinator
        .cached_region(&account)
        .await
        .map_err(ApiError::from)?;

    let payload = match cached {
        Some(result) => RegionPayload::resolved(&result),
        None => RegionPayload::absent(),
    };
    Ok(ok(payload))
}

async fn remove_cached_region(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .coordinator
        .remove_cached_region(&account)
        .await
        .map_err(ApiError::from)?;
    Ok(ok(serde_json::json!({ "removed": removed })))
}

async fn clear_region_cache(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.coordinator.clear_region_cache().await?;
    info!(removed, "region cache cleared");
    Ok(ok(serde_json::json!({ "removed": removed })))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let (region, profile) = state.coordinator.cache_stats().await?;
    Ok(ok(StatsPayload {
        region: CacheDomainStats {
            counts: region,
            expiry_days: state.coordinator.region_ttl_days(),
        },
        profile: CacheDomainStats {
            counts: profile,
            expiry_days: state.coordinator.profile_ttl_days(),
        },
    }))
}

async fn get_cached_profile(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .coordinator
        .cached_profile(&account)
        .await
        .map_err(ApiError::from)?;
    Ok(ok(serde_json::json!({ "profile": profile })))
}

async fn put_cached_profile(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
    Json(profile): Json<ProfileResult>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .coordinator
        .put_profile(&account, profile)
        .await
        .map_err(ApiError::from)?;
    Ok(ok(serde_json::json!({})))
}

async fn clear_profile_cache(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.coordinator.clear_profile_cache().await?;
    info!(removed, "profile cache cleared");
    Ok(ok(serde_json::json!({ "removed": removed })))
}

// GET /queue/status handler (for debugging)
async fn queue_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<QueueStatus>> {
    ok(state.coordinator.queue_status())
}

// POST /settings/max-concurrent handler: out-of-range values are clamped
async fn set_max_concurrent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MaxConcurrentRequest>,
) -> impl IntoResponse {
    let applied = state.coordinator.set_max_concurrent(request.value);
    info!(requested = request.value, applied, "updated max concurrent lookups");
    ok(serde_json::json!({ "applied": applied }))
}

fn parse_account(account: &str) -> Result<AccountKey, ApiError> {
    AccountKey::parse(account).map_err(|err| ApiError::InvalidAccount(err.to_string()))
}

async fn add_trust(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key = parse_account(&account)?;
    trust::add(&state.db_pool, key.as_str()).await?;
    info!(account = %key, "account added to trust list");
    Ok(ok(serde_json::json!({})))
}

async fn remove_trust(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key = parse_account(&account)?;
    let removed = trust::remove(&state.db_pool, key.as_str()).await?;
    Ok(ok(serde_json::json!({ "removed": removed })))
}

async fn list_trust(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let accounts = trust::all(&state.db_pool).await?;
    Ok(ok(serde_json::json!({ "accounts": accounts })))
}

async fn trust_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let count = trust::count(&state.db_pool).await?;
    Ok(ok(serde_json::json!({ "count": count })))
}

async fn clear_trust(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let removed = trust::clear(&state.db_pool).await?;
    info!(removed, "trust list cleared");
    Ok(ok(serde_json::json!({ "removed": removed })))
}
