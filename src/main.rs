//! WorldStats server.
//!
//! Startup order: configuration, storage and seed data, cache, realtime
//! heartbeat, optional initial sync, cron scheduler, then the HTTP server.
//! Ctrl-C stops the background tasks and drains open connections.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use worldstats::api::{AppState, router, spawn_limiter_pruning};
use worldstats::cache::Cache;
use worldstats::config::Config;
use worldstats::error::expose_error_details;
use worldstats::providers::default_providers;
use worldstats::realtime::Broadcaster;
use worldstats::scheduler;
use worldstats::seed;
use worldstats::storage::Storage;
use worldstats::sync::SyncService;

/// How often idle rate limiter keys are dropped.
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("worldstats=info".parse()?))
        .init();

    let config = Config::from_env()?;
    expose_error_details(config.environment.is_development());

    info!(
        port = config.port,
        environment = ?config.environment,
        db_url = %config.database_url,
        "Starting WorldStats server"
    );

    let storage = Storage::new(&config.database_url).await?;
    let seeded = seed::seed_if_empty(&storage).await?;
    info!(seeded, "Database initialized");

    let cache = Cache::connect(config.redis_url.as_deref()).await;
    info!(backend = cache.backend_name(), "Cache ready");

    let broadcaster = Broadcaster::new();
    let heartbeat = broadcaster.spawn_heartbeat(config.heartbeat_interval);

    let sync = SyncService::new(
        storage.clone(),
        cache.clone(),
        broadcaster.clone(),
        default_providers(),
    )
    .with_payload_ttl(config.payload_ttl);

    if config.sync_on_startup {
        let initial = sync.clone();
        tokio::spawn(async move {
            let report = initial.sync_all().await;
            if !report.success {
                error!(error = ?report.error, "Initial sync did not complete");
            }
        });
    }

    let scheduler = scheduler::spawn(sync.clone(), &config.sync_cron)?;

    let state = AppState::new(storage, cache, broadcaster, sync, &config);
    let limiter_pruning = state
        .limiter
        .clone()
        .map(|limiter| spawn_limiter_pruning(limiter, LIMITER_PRUNE_INTERVAL));
    let app = router(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "WorldStats is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    heartbeat.abort();
    scheduler.abort();
    if let Some(task) = limiter_pruning {
        task.abort();
    }
    info!("WorldStats stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        // Without a signal handler, keep serving.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
