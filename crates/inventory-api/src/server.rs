//! Inventory HTTP server lifecycle management.
//!
//! Provides [`bind_addr`] to resolve the configured address and [`serve`]
//! which runs the Axum server on a bound listener until the provided
//! [`CancellationToken`] is cancelled.

use std::net::SocketAddr;
use std::sync::Arc;

use inventory_core::config::ServerSection;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Resolve the configured bind address.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if host and port do not form a socket
/// address.
pub fn bind_addr(config: &ServerSection) -> Result<SocketAddr, ServerError> {
    format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))
}

/// Serve requests on an already-bound listener until `shutdown` fires.
///
/// In-flight requests are allowed to finish. Open watch streams are ended
/// by the watch manager's own shutdown, which should run first.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let router = build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("Inventory server stopped");
    Ok(())
}

/// Errors that can occur when starting or running the inventory server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
