//! Integration tests for the WorldStats HTTP API.
//!
//! These tests drive the real router against an in-memory database seeded
//! with the reference countries and a memory-only cache.

use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use worldstats::api::{AppState, prune_limiter, router};
use worldstats::cache::Cache;
use worldstats::config::Config;
use worldstats::providers::default_providers;
use worldstats::realtime::Broadcaster;
use worldstats::seed;
use worldstats::storage::Storage;
use worldstats::sync::SyncService;

async fn create_test_state(config: &Config) -> AppState {
    let storage = tokio_test::assert_ok!(Storage::new("sqlite::memory:").await);
    seed::seed_if_empty(&storage).await.unwrap();

    let cache = Cache::memory();
    let broadcaster = Broadcaster::new();
    let sync = SyncService::new(
        storage.clone(),
        cache.clone(),
        broadcaster.clone(),
        default_providers(),
    );
    AppState::new(storage, cache, broadcaster, sync, config)
}

async fn create_test_server() -> TestServer {
    let mut config = Config::default();
    // Room for the status polling below.
    config.rate_limit.max_requests = 10_000;
    let state = create_test_state(&config).await;
    TestServer::new(router(state, &config)).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server().await;

    let response = server.get("/api/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
    assert_eq!(body["cache"], "memory");
    assert_eq!(body["syncRunning"], false);
}

#[tokio::test]
async fn test_index() {
    let server = create_test_server().await;

    let body: Value = server.get("/api").await.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "WorldStats API");
}

#[tokio::test]
async fn test_router_serves_without_test_server() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let config = Config::default();
    let app = router(create_test_state(&config).await, &config);

    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_countries_is_cached() {
    let server = create_test_server().await;

    let first: Value = server.get("/api/countries").await.json();
    assert_eq!(first["success"], true);
    assert_eq!(first["count"], 10);
    assert_eq!(first["cached"], false);

    let second: Value = server.get("/api/countries").await.json();
    assert_eq!(second["cached"], true);
    assert_eq!(second["data"], first["data"]);
}

#[tokio::test]
async fn test_search() {
    let server = create_test_server().await;

    let response = server.get("/api/countries/search?q=germ").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["query"], "germ");
    assert_eq!(body["data"][0]["code"], "DE");

    let response = server.get("/api/countries/search").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Search query is required");
}

#[tokio::test]
async fn test_get_country() {
    let server = create_test_server().await;

    let response = server.get("/api/country/us").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["country"], "United States");
    assert_eq!(body["data"]["code"], "US");
    assert_eq!(body["data"]["categories"]["political"]["isUN"], true);
    assert!(body["data"]["categories"]["crime"]["crimeCategories"].is_array());

    // Alpha-3 resolves to the same country.
    let body: Value = server.get("/api/country/USA").await.json();
    assert_eq!(body["data"]["code"], "US");
}

#[tokio::test]
async fn test_unknown_country_is_404() {
    let server = create_test_server().await;

    let response = server.get("/api/country/xx").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "Country with code XX not found");
}

#[tokio::test]
async fn test_charts_and_summary() {
    let server = create_test_server().await;

    let charts: Value = server.get("/api/country/fr/charts").await.json();
    assert_eq!(
        charts["data"]["militaryRadarChart"]["labels"],
        json!(["Tanks", "Aircraft", "Naval Vessels", "Personnel", "Defense Budget"])
    );
    assert_eq!(charts["data"]["populationDonutChart"]["labels"], json!(["Male", "Female"]));

    let summary: Value = server.get("/api/country/jp/summary").await.json();
    assert_eq!(summary["data"]["model"], "fallback");
    assert_eq!(summary["cached"], false);
    assert!(summary["data"]["summary"].as_str().unwrap().contains("Japan"));
}

#[tokio::test]
async fn test_compare() {
    let server = create_test_server().await;

    let response = server.get("/api/compare?c1=us").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body["error"]["message"],
        "Both country codes (c1 and c2) are required"
    );

    let response = server.get("/api/compare?c1=us&c2=de").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["country1"]["code"], "US");
    assert_eq!(body["data"]["country2"]["name"], "Germany");
    assert!(body["data"]["categories"]["economy"].is_array());
    assert!(body["data"]["summary"]["scores"]["country1"].is_number());

    let response = server.get("/api/compare?c1=us&c2=zz").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_conflict_while_running() {
    let config = Config::default();
    let state = create_test_state(&config).await;
    let sync = state.sync.clone();
    let server = TestServer::new(router(state, &config)).unwrap();

    let permit = sync.try_begin().unwrap();

    let response = server.post("/api/sync").await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "SYNC_IN_PROGRESS");

    let status: Value = server.get("/api/sync/status").await.json();
    assert_eq!(status["data"]["isRunning"], true);
    assert!(status["data"]["startedAt"].is_string());

    drop(permit);
}

#[tokio::test]
async fn test_sync_runs_in_background() {
    let server = create_test_server().await;

    let response = server.post("/api/sync").await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Sync started");
    let started_at = body["data"]["startedAt"].clone();
    assert!(started_at.is_string());

    let mut status = Value::Null;
    for _ in 0..200 {
        status = server.get("/api/sync/status").await.json();
        if status["data"]["isRunning"] == false && !status["data"]["lastReport"].is_null() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let report = &status["data"]["lastReport"];
    assert_eq!(report["success"], true);
    assert_eq!(report["startedAt"], started_at);
    assert_eq!(report["countriesUpdated"], 10);
    assert_eq!(report["results"].as_array().unwrap().len(), 8);
    // A started and a terminal row per provider; only the latest 20 are listed.
    assert_eq!(status["data"]["logs"].as_array().unwrap().len(), 16);

    let country: Value = server.get("/api/country/gb").await.json();
    assert_eq!(country["cached"], false);
    assert_eq!(country["data"]["categories"]["economy"]["currencyCode"], "GBP");
}

#[tokio::test]
async fn test_sse_subscription_errors() {
    let server = create_test_server().await;

    let response = server
        .post("/api/sse/subscribe/00000000-0000-0000-0000-000000000000")
        .json(&json!({ "countries": ["US"] }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .post("/api/sse/subscribe/00000000-0000-0000-0000-000000000000")
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route() {
    let server = create_test_server().await;

    let response = server.get("/api/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Route not found: GET /api/nope");
}

#[tokio::test]
async fn test_rate_limit() {
    let mut config = Config::default();
    config.rate_limit.max_requests = 2;
    config.rate_limit.window = Duration::from_secs(3600);
    let state = create_test_state(&config).await;
    let server = TestServer::new(router(state, &config)).unwrap();

    server.get("/api/countries").await.assert_status_ok();
    server.get("/api/countries").await.assert_status_ok();

    let response = server.get("/api/countries").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");

    // Other clients have their own budget.
    server
        .get("/api/countries")
        .add_header(
            axum::http::HeaderName::from_static("x-forwarded-for"),
            axum::http::HeaderValue::from_static("203.0.113.7"),
        )
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_idle_rate_limit_keys_are_pruned() {
    let mut config = Config::default();
    config.rate_limit.max_requests = 1;
    config.rate_limit.window = Duration::from_millis(50);
    let state = create_test_state(&config).await;
    let limiter = state.limiter.clone().unwrap();
    let server = TestServer::new(router(state, &config)).unwrap();

    for i in 0..20 {
        server
            .get("/api/health")
            .add_header(
                axum::http::HeaderName::from_static("x-forwarded-for"),
                axum::http::HeaderValue::from_str(&format!("198.51.100.{i}")).unwrap(),
            )
            .await
            .assert_status_ok();
    }
    assert_eq!(limiter.len(), 20);

    // Each budget refills after one window; the keys are then forgettable.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(prune_limiter(&limiter), 0);
    assert!(limiter.is_empty());

    // A pruned client starts over with a full budget.
    server
        .get("/api/health")
        .add_header(
            axum::http::HeaderName::from_static("x-forwarded-for"),
            axum::http::HeaderValue::from_static("198.51.100.0"),
        )
        .await
        .assert_status_ok();
    assert_eq!(limiter.len(), 1);
}
