//! HTTP API for WorldStats.
//!
//! Every JSON response is wrapped: `{ "success": true, "data": ... }` on
//! success, and the [`AppError`] envelope otherwise. List-like responses add
//! `count`, cached views add `cached`.
//!
//! # Routes
//!
//! - `GET  /api` - service index
//! - `GET  /api/health` - database, cache, sync and realtime state
//! - `GET  /api/countries` - all countries
//! - `GET  /api/countries/search?q=` - fuzzy search
//! - `GET  /api/country/:code` - full country detail
//! - `GET  /api/country/:code/charts` - chart bundle
//! - `GET  /api/country/:code/summary` - prose summary
//! - `GET  /api/compare?c1=&c2=` - side-by-side comparison
//! - `POST /api/sync` - start a full sync in the background
//! - `GET  /api/sync/status` - current run, last report, recent sync logs
//! - `GET  /api/sse/updates` - server-sent events stream
//! - `POST /api/sse/subscribe/:clientId`, `POST /api/sse/unsubscribe/:clientId`
//! - `GET  /ws/compare` - WebSocket

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use crate::cache::Cache;
use crate::config::{Config, RateLimitConfig};
use crate::error::{ApiResult, AppError, route_not_found};
use crate::model::CountryListItem;
use crate::realtime::{Broadcaster, sse, ws};
use crate::services::{
    Lookup,
    chart::{ChartBundle, ChartService},
    comparison::{Comparison, ComparisonService},
    country::{CountryService, CountryView},
    summary::{CountrySummary, SummaryService},
};
use crate::storage::{Storage, SyncLogRow};
use crate::sync::{SyncReport, SyncService};

/// Number of sync log rows returned by the status endpoint.
const SYNC_LOG_LIMIT: u32 = 20;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub cache: Cache,
    pub broadcaster: Broadcaster,
    pub sync: SyncService,
    pub countries: CountryService,
    pub charts: ChartService,
    pub comparisons: ComparisonService,
    pub summaries: SummaryService,
    /// Per-client request budget; `None` when rate limiting is disabled.
    pub limiter: Option<KeyedLimiter>,
}

impl AppState {
    /// Wire the query services on top of shared storage and cache.
    pub fn new(
        storage: Storage,
        cache: Cache,
        broadcaster: Broadcaster,
        sync: SyncService,
        config: &Config,
    ) -> Self {
        let ttl = config.cache_ttl;
        let countries = CountryService::new(storage.clone(), cache.clone(), ttl.country);
        let charts = ChartService::new(storage.clone(), cache.clone(), ttl.charts);
        let comparisons = ComparisonService::new(countries.clone(), cache.clone(), ttl.comparison);
        let summaries = SummaryService::new(
            storage.clone(),
            countries.clone(),
            cache.clone(),
            ttl.ai_summary,
            config.summary_model.clone(),
        );

        Self {
            storage,
            cache,
            broadcaster,
            sync,
            countries,
            charts,
            comparisons,
            summaries,
            limiter: keyed_limiter(&config.rate_limit),
        }
    }
}

/// Build the full application router.
pub fn router(state: AppState, config: &Config) -> Router {
    let mut api = Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/countries", get(list_countries))
        .route("/countries/search", get(search_countries))
        .route("/country/:code", get(get_country))
        .route("/country/:code/charts", get(get_charts))
        .route("/country/:code/summary", get(get_summary))
        .route("/compare", get(compare))
        .route("/sync", post(start_sync))
        .route("/sync/status", get(sync_status))
        .route("/sse/updates", get(sse::sse_handler))
        .route("/sse/subscribe/:client_id", post(sse::sse_subscribe))
        .route("/sse/unsubscribe/:client_id", post(sse::sse_unsubscribe));

    match state.limiter.clone() {
        Some(limiter) => api = api.layer(middleware::from_fn_with_state(limiter, rate_limit)),
        None => warn!("Rate limiting disabled"),
    }

    Router::new()
        .nest("/api", api)
        .route("/ws/compare", get(ws::ws_handler))
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.cors_origins)),
        )
        .with_state(state)
}

// ============================================================================
// Response envelope
// ============================================================================

/// `{ success: true, data, ... }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            cached: None,
            count: None,
            query: None,
            message: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> From<Lookup<T>> for Envelope<T> {
    fn from(lookup: Lookup<T>) -> Self {
        let mut envelope = Envelope::new(lookup.data);
        envelope.cached = Some(lookup.cached);
        envelope
    }
}

// ============================================================================
// Service endpoints
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

/// GET /api - Service index.
pub async fn index() -> Json<Envelope<IndexResponse>> {
    Json(Envelope::new(IndexResponse {
        name: "WorldStats API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "GET /api/health",
            "GET /api/countries",
            "GET /api/countries/search?q=",
            "GET /api/country/:code",
            "GET /api/country/:code/charts",
            "GET /api/country/:code/summary",
            "GET /api/compare?c1=&c2=",
            "POST /api/sync",
            "GET /api/sync/status",
            "GET /api/sse/updates",
            "GET /ws/compare",
        ],
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// `ok` or `degraded`.
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: bool,
    pub cache: &'static str,
    pub sync_running: bool,
    pub realtime_clients: usize,
}

/// GET /api/health - 200 when the database answers, 503 otherwise.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.storage.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            false
        }
    };

    let report = HealthReport {
        status: if database { "ok" } else { "degraded" },
        timestamp: Utc::now(),
        database,
        cache: state.cache.backend_name(),
        sync_running: state.sync.is_running(),
        realtime_clients: state.broadcaster.client_count(),
    };
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

// ============================================================================
// Countries
// ============================================================================

/// GET /api/countries - All countries, ordered by name.
#[instrument(skip(state))]
pub async fn list_countries(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<CountryListItem>>>> {
    let lookup = state.countries.list().await?;
    let count = lookup.data.len();
    Ok(Json(Envelope::from(lookup).with_count(count)))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// GET /api/countries/search?q= - Fuzzy search, best matches first.
#[instrument(skip(state))]
pub async fn search_countries(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Envelope<Vec<CountryListItem>>>> {
    let q = query.q.unwrap_or_default();
    let results = state.countries.search(&q).await?;
    let count = results.len();
    Ok(Json(Envelope::new(results).with_count(count).with_query(q.trim())))
}

/// GET /api/country/:code - Full detail by alpha-2 or alpha-3 code.
#[instrument(skip(state))]
pub async fn get_country(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Envelope<CountryView>>> {
    Ok(Json(state.countries.get(&code).await?.into()))
}

/// GET /api/country/:code/charts
#[instrument(skip(state))]
pub async fn get_charts(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Envelope<ChartBundle>>> {
    Ok(Json(state.charts.charts(&code).await?.into()))
}

/// GET /api/country/:code/summary
#[instrument(skip(state))]
pub async fn get_summary(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Envelope<CountrySummary>>> {
    Ok(Json(state.summaries.summary(&code).await?.into()))
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub c1: Option<String>,
    pub c2: Option<String>,
}

/// GET /api/compare?c1=&c2=
#[instrument(skip(state))]
pub async fn compare(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<Json<Envelope<Comparison>>> {
    let present = |code: Option<String>| code.filter(|c| !c.trim().is_empty());
    let (Some(c1), Some(c2)) = (present(query.c1), present(query.c2)) else {
        return Err(AppError::validation(
            "Both country codes (c1 and c2) are required",
        ));
    };

    Ok(Json(state.comparisons.compare(&c1, &c2).await?.into()))
}

// ============================================================================
// Sync
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStarted {
    pub started_at: DateTime<Utc>,
}

/// POST /api/sync - Start a full sync in the background.
///
/// Returns `202 Accepted` when the run starts and `409 Conflict` when one
/// is already running.
#[instrument(skip(state))]
pub async fn start_sync(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<Envelope<SyncStarted>>)> {
    let Some(permit) = state.sync.try_begin() else {
        return Err(AppError::SyncInProgress);
    };

    let started_at = permit.started_at();
    let sync = state.sync.clone();
    tokio::spawn(async move {
        sync.run(permit).await;
    });
    info!("Sync triggered via API");

    Ok((
        StatusCode::ACCEPTED,
        Json(Envelope::new(SyncStarted { started_at }).with_message("Sync started")),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_report: Option<SyncReport>,
    pub logs: Vec<SyncLogRow>,
}

/// GET /api/sync/status
#[instrument(skip(state))]
pub async fn sync_status(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<SyncStatusResponse>>> {
    let status = state.sync.status();
    let logs = state.storage.recent_sync_logs(SYNC_LOG_LIMIT).await?;

    Ok(Json(Envelope::new(SyncStatusResponse {
        is_running: status.is_running,
        started_at: status.started_at,
        last_report: status.last_report,
        logs,
    })))
}

// ============================================================================
// Middleware
// ============================================================================

pub type KeyedLimiter = Arc<DefaultKeyedRateLimiter<String>>;

/// `max_requests` per `window`, refilled evenly. `None` when either is zero.
fn keyed_limiter(config: &RateLimitConfig) -> Option<KeyedLimiter> {
    let burst = NonZeroU32::new(config.max_requests)?;
    let quota = Quota::with_period(config.window / burst.get())?.allow_burst(burst);
    Some(Arc::new(RateLimiter::keyed(quota)))
}

async fn rate_limit(
    State(limiter): State<KeyedLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let key = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "shared".to_string());

    if limiter.check_key(&key).is_err() {
        return AppError::RateLimited.into_response();
    }
    next.run(request).await
}

/// Forget clients whose budget has fully refilled.
///
/// # Returns
///
/// The number of clients still tracked.
pub fn prune_limiter(limiter: &DefaultKeyedRateLimiter<String>) -> usize {
    let before = limiter.len();
    limiter.retain_recent();
    limiter.shrink_to_fit();
    let after = limiter.len();
    if before > after {
        debug!(pruned = before - after, remaining = after, "Pruned rate limiter keys");
    }
    after
}

/// Run [`prune_limiter`] every `interval` until the task is aborted.
pub fn spawn_limiter_pruning(limiter: KeyedLimiter, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            prune_limiter(&limiter);
        }
    })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
