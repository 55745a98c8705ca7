//! Parking statistics HTTP server binary
//!
//! Restores the stores from their snapshots, starts the background jobs and
//! serves the REST API until Ctrl+C, then flushes every store.
//!
//! # Usage
//!
//! ```bash
//! # Defaults, or ./parking-stats.toml when present
//! cargo run --bin parking-stats-server
//!
//! # Explicit configuration file
//! cargo run --bin parking-stats-server -- /etc/parking-stats.toml
//! ```
//!
//! # Environment Variables
//!
//! - `PARKING_STATS_CONFIG`: Configuration file (when no argument is given)
//! - `PARKING_STATS_DATA_DIR`: Overrides `storage.data_dir`
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `RUST_LOG`: Log filter (default: info)

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use parking_stats::config::AppConfig;
use parking_stats::db::RepositoryFactory;
use parking_stats::http::{create_router, AppState};
use parking_stats::scheduler::{Scheduler, SchedulerSettings};
use parking_stats::services::{JsonFileSource, OccupancySource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; `log` records from the library are bridged in.
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting parking statistics server");

    let config_path = env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    let stores = RepositoryFactory::open(&config)?;
    info!(
        "Stores restored from {} ({} lots, {} historic days)",
        config.storage.data_dir.display(),
        stores.occupancy.len(),
        stores.historic.len()
    );

    let source = config
        .source
        .snapshot_file
        .clone()
        .map(|path| Arc::new(JsonFileSource::new(path)) as Arc<dyn OccupancySource>);
    let scheduler = Scheduler::new(
        stores.clone(),
        source,
        SchedulerSettings::from_config(&config)?,
    )
    .start();

    let app = create_router(AppState::new(stores));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Flush even when serving failed.
    let failures = scheduler.shutdown().await;
    for (name, e) in &failures {
        error!("Store '{}' was not flushed: {}", name, e);
    }
    served?;

    if failures.is_empty() {
        info!("Server shutdown complete");
    } else {
        warn!("Server shutdown with {} unflushed store(s)", failures.len());
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, starting graceful shutdown"),
        Err(e) => {
            warn!("Ctrl+C handler installation failed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
