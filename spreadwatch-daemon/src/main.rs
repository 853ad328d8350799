//! Headless spreadwatch monitor.
//!
//! Wires live HTTP rate sources and a file-backed store to the core engine,
//! then runs the adaptive refresh scheduler until Ctrl-C.
//!
//! Configuration:
//! - `SPREADWATCH_DATA_DIR` - where settings/history land (default `./data`)
//! - `SPREADWATCH_SOURCES`  - override the quote sources, see `sources.rs`
//! - `RUST_LOG`             - tracing filter (default `info`)

mod sources;
mod store;

use chrono::Utc;
use spreadwatch::{RateAggregator, RefreshScheduler, SpreadMonitor};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("Starting spreadwatch daemon");

    let data_dir =
        std::env::var("SPREADWATCH_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    info!(data_dir = %data_dir, "using data directory");

    let store = Arc::new(store::FileStore::new(&data_dir));
    store.ensure_dir().await?;

    let sources = sources::build_sources();
    info!(sources = sources.len(), "configured rate sources");

    let monitor = Arc::new(SpreadMonitor::new(
        RateAggregator::new(sources),
        store.clone(),
        store,
    ));

    // The fetch loop must not start until settings and history are loaded.
    if let Err(err) = monitor.init(Utc::now()).await {
        error!(%err, "failed to initialise from store");
        return Err(err.into());
    }

    let scheduler = RefreshScheduler::start(monitor.clone())?;
    info!("refresh scheduler running, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    scheduler.shutdown().await;

    let snapshot = monitor.snapshot();
    info!(
        market_rate = snapshot.market_rate,
        diff = snapshot.diff,
        risk = %snapshot.risk_level,
        "final state at shutdown"
    );

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
