//! REST and watch API server for the inventory service.
//!
//! This crate provides an Axum HTTP server that exposes one provider's
//! inventory:
//!
//! - **Collections** (`/providers/{p}/{collection}`) listed as reference
//!   stubs, or with full content under `?detail=1`
//! - **Items** (`/providers/{p}/{collection}/{id}`) with full content
//! - **Trees** (`/providers/{p}/tree/{view}`) materialized on demand
//! - **Watches**: a collection request with the `X-Watch` header upgrades
//!   to a `WebSocket` carrying a snapshot, a parity marker, then changes
//!
//! # Architecture
//!
//! Every read goes through the [`Store`](inventory_db::Store) trait held in
//! [`AppState`]. Watches are served by the shared
//! [`WatchManager`](inventory_core::WatchManager), which owns the only
//! subscription to the store's event feed.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod tree;
pub mod watch;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use handlers::WATCH_HEADER;
pub use router::build_router;
pub use server::{ServerError, serve};
pub use startup::{StartupError, spawn_api};
pub use state::AppState;
