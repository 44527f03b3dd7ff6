//! Inventory service binary.
//!
//! Wires the in-memory store, the watch manager and the REST/watch API
//! together and serves until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `inventory-config.yaml` (path overridable
//!    with `INVENTORY_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load the inventory fixture into the store, if configured
//! 4. Start the watch manager on the store's change feed
//! 5. Start the API server
//! 6. On `Ctrl-C`, close every watch, then drain the server

mod error;
mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use inventory_api::AppState;
use inventory_core::config::LoggingConfig;
use inventory_core::{InventoryConfig, WatchManager};
use inventory_db::MemoryStore;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ServiceError;

/// Application entry point for the inventory server.
///
/// # Errors
///
/// Returns an error if any initialization step fails or the server task
/// dies.
#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("inventory-server starting");
    info!(
        host = config.server.host,
        port = config.server.port,
        provider = config.provider.uid,
        queue_capacity = config.watch.queue_capacity,
        max_depth = config.tree.max_depth,
        "Configuration loaded"
    );

    // 3. Seed the store.
    let store = Arc::new(MemoryStore::new());
    if let Some(path) = &config.store.seed_path {
        let records = seed::load(path)?;
        let count = records.len();
        let revision = store.load(records)?;
        info!(path = %path.display(), count, revision, "Inventory fixture loaded");
    } else {
        info!("No fixture configured, starting with an empty store");
    }

    // 4. Start the watch manager.
    let watch = WatchManager::start(store.clone(), &config.watch)?;

    // 5. Start the API server.
    let state = Arc::new(AppState::new(
        store,
        watch.clone(),
        &config.provider,
        config.tree.clone(),
    ));
    let shutdown = CancellationToken::new();
    let (addr, server) = inventory_api::spawn_api(&config.server, state, shutdown.clone()).await?;
    info!(%addr, provider = config.provider.name, "Inventory API started");

    // 6. Serve until interrupted.
    tokio::signal::ctrl_c()
        .await
        .map_err(|source| ServiceError::Signal { source })?;
    info!("Shutdown requested");

    watch.shutdown().await;
    shutdown.cancel();
    server.await?;

    info!("inventory-server stopped");
    Ok(())
}

/// Load configuration from `INVENTORY_CONFIG` or `inventory-config.yaml`.
///
/// A missing file means defaults; environment overrides apply either way.
fn load_config() -> Result<InventoryConfig, ServiceError> {
    let path = std::env::var("INVENTORY_CONFIG")
        .map_or_else(|_| PathBuf::from("inventory-config.yaml"), PathBuf::from);
    if path.exists() {
        Ok(InventoryConfig::from_file(&path)?)
    } else {
        let mut config = InventoryConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
