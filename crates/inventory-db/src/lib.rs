//! Data layer for the inventory tree and watch service.
//!
//! The storage engine itself is an external collaborator; this crate pins
//! down the contract the engines rely on and ships an in-memory
//! implementation used by the server binary and by tests.
//!
//! # Architecture
//!
//! ```text
//! REST list/get ----> Store::list / Store::get
//! TreeBuilder ------> Navigator --> Store::list (relation queries)
//! WatchManager -----> EventSource::snapshot (revision R)
//!                 +-> EventSource::take_feed --> StoreEvent (revision order)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- `Store` / `EventSource` traits, snapshots and change events
//! - [`memory`] -- `MemoryStore`, the in-memory revisioned implementation
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use memory::MemoryStore;
pub use store::{Change, EventSource, Feed, Revision, Snapshot, Store, StoreEvent};
