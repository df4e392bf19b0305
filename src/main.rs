//! ==============================================================================
//! main.rs - greenhouse host entry point
//! ==============================================================================
//!
//! responsibilities:
//!     - load configuration and install the log subscriber
//!     - create the shared aggregation store
//!     - spawn the aggregator task and the database poll loop
//!     - serve the dashboard until the process exits
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                          host                               │
//!     │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//!     │  │ poll loop   │─►│ aggregator  │  │ web server          │  │
//!     │  │ (firebase)  │  │ (1 writer)  │  │ (readers)           │  │
//!     │  └─────────────┘  └──────┬──────┘  └──────────┬──────────┘  │
//!     │                          │                    │             │
//!     │                    ┌─────┴────────────────────┴─┐           │
//!     │                    │        SharedStore         │           │
//!     │                    └────────────────────────────┘           │
//!     └─────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

use greenhouse_host::config::HostConfig;
use greenhouse_host::feed::{self, FirebaseSource};
use greenhouse_host::server;
use greenhouse_host::{AggregationStore, SharedStore};

use anyhow::{Context, Result};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

/// room for one full history window plus headroom
const FEED_CAPACITY: usize = 512;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: logging, then configuration (which may change the level)
    let log_handle = init_logging();
    let config = HostConfig::load_or_default();
    apply_log_level(&log_handle, &config.logging.level);
    config.print_summary();

    // step 2: initialize shared state
    let store = SharedStore::new(AggregationStore::new(config.aggregation.day_boundary));

    // step 3: feeds + the single writer
    let (senders, aggregator) = feed::channels(store.clone(), FEED_CAPACITY, config.logging.show_readings);
    tokio::spawn(aggregator.run());

    // step 4: poll the database in background
    if config.source.url.is_empty() {
        tracing::warn!("source.url is not set - dashboard will stay empty");
    } else {
        let source = FirebaseSource::new(&config.source.url, &config.source.path, config.source.auth.clone());
        let window = config.source.history_window;
        let interval = Duration::from_secs(config.source.poll_interval_seconds.max(1));
        tokio::spawn(feed::run_poller(source, window, interval, senders));
    }

    // step 5: serve the dashboard
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(addr = %config.server.bind, "dashboard live");
    server::serve(listener, store).await
}

fn init_logging() -> reload::Handle<EnvFilter, Registry> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}

// RUST_LOG wins over the configured level
fn apply_log_level(handle: &reload::Handle<EnvFilter, Registry>, level: &str) {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    match EnvFilter::try_new(level) {
        Ok(filter) => {
            if let Err(e) = handle.reload(filter) {
                tracing::warn!(error = %e, "failed to apply log level");
            }
        }
        Err(e) => tracing::warn!(level = level, error = %e, "invalid log level, keeping info"),
    }
}
