//! Error types for the inventory server binary.
//!
//! [`ServiceError`] is the top-level error type that wraps all possible
//! failure modes during startup and shutdown.

/// Top-level error for the inventory server binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: inventory_core::ConfigError,
    },

    /// The inventory fixture could not be loaded.
    #[error("seed error: {source}")]
    Seed {
        /// The underlying seed error.
        #[from]
        source: crate::seed::SeedError,
    },

    /// The store rejected the seed records.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: inventory_db::DbError,
    },

    /// The watch manager failed to start.
    #[error("watch error: {source}")]
    Watch {
        /// The underlying watch error.
        #[from]
        source: inventory_core::WatchError,
    },

    /// The API server failed to start.
    #[error("api error: {source}")]
    Api {
        /// The underlying startup error.
        #[from]
        source: inventory_api::StartupError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The API server task panicked or was cancelled.
    #[error("server task error: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
