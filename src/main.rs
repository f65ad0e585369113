// SPDX-License-Identifier: MIT

//! Cardfolio core process.
//!
//! Boots the store and services, warms the user directory, and runs the
//! periodic credential sweep. The HTTP layer consuming the core's
//! operations is deployed separately.

use cardfolio::{clock::SystemClock, config::Config, db::MemoryStore, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        sweep_interval_secs = config.sweep_interval_secs,
        "Starting cardfolio core"
    );

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(SystemClock);
    let state = Arc::new(AppState::new(config, store, clock));

    state
        .directory
        .warm_up()
        .await
        .expect("Failed to warm up user directory");

    // Periodic credential sweep; issuance and validation run concurrently
    // with it without coordination.
    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(state.config.sweep_interval_secs));
    loop {
        ticker.tick().await;
        match state.credentials.sweep().await {
            Ok(removed) => tracing::debug!(removed, "Credential sweep complete"),
            Err(e) => tracing::error!(error = %e, "Credential sweep failed"),
        }
    }
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cardfolio=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
