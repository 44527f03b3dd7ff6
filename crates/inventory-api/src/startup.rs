//! Server startup helper for embedding in the inventory binary.
//!
//! Provides [`spawn_api`] which binds the listener up front and then runs
//! the HTTP + `WebSocket` server on a background Tokio task.
//!
//! # Usage
//!
//! ```rust,ignore
//! use inventory_api::startup::spawn_api;
//!
//! let (addr, handle) = spawn_api(&config.server, state, shutdown.clone()).await?;
//! // ... later
//! shutdown.cancel();
//! handle.await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use inventory_core::config::ServerSection;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::server::{ServerError, bind_addr, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the inventory server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the inventory HTTP server on a background Tokio task.
///
/// The listener is bound before the task is spawned, so a port conflict
/// is reported here rather than logged from the background. Returns the
/// bound address (useful with port `0`) and a [`JoinHandle`] that
/// completes once `shutdown` is cancelled and the server has drained.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot
/// be bound.
pub async fn spawn_api(
    config: &ServerSection,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(SocketAddr, JoinHandle<()>), StartupError> {
    let addr = bind_addr(config)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address for {addr}: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Inventory server exited with error");
        }
    });

    tracing::info!(addr = %local, "Inventory server listening");

    Ok((local, handle))
}
