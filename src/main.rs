// Initialize configuration
// Set up logging
// Create database connection pool
// Initialize caches and the lookup queue
// Wire the coordinator and page hub
// Start HTTP/WebSocket server

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use region_lookup_service::{
    api,
    automation::{AutomationRunner, RunnerConfig},
    cache::AppCache,
    config::Config,
    db,
    hub::{HubProbe, PageHub},
    queue::QueryQueue,
    service::Coordinator,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting region-lookup-service");

    let config = Config::from_env();
    tracing::info!("configuration loaded: {:?}", config);

    let db_pool = db::connection::establish_connection(&config.database_url).await?;
    tracing::info!("database connection established");

    let cache = AppCache::new(db_pool.clone());
    let queue = QueryQueue::new(config.max_concurrent_queries, config.queue_capacity);
    tracing::info!(
        max_concurrent = config.max_concurrent_queries,
        capacity = config.queue_capacity,
        "lookup queue initialized"
    );

    let hub = Arc::new(PageHub::new());
    let probe = Arc::new(HubProbe::new(hub.clone(), config.probe_timeout));
    let runner = AutomationRunner::new(
        probe,
        RunnerConfig {
            retry_attempts: config.probe_retry_attempts,
            retry_min_delay: Duration::from_millis(500),
            pacing_min: config.pacing_min,
            pacing_max: config.pacing_max,
            launches_per_minute: config.query_rate_limit,
        },
    );
    let coordinator = Coordinator::new(cache, queue, runner, hub.clone());

    let state = Arc::new(AppState {
        config: config.clone(),
        db_pool,
        coordinator,
        hub,
    });

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    let app = api::create_router(state);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("starting server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
