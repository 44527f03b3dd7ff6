//! Shared type definitions for the inventory tree and watch service.
//!
//! This crate is the single source of truth for the types exchanged between
//! the store, the tree and watch engines, and the REST layer. Types flow
//! downstream to `TypeScript` via `ts-rs` for dashboard clients.
//!
//! # Modules
//!
//! - [`ids`] -- Record and subscription identifiers
//! - [`kinds`] -- Entity kinds and watch event types
//! - [`record`] -- Flat inventory records and references
//! - [`filter`] -- Equality filters shared by lists and watches
//! - [`wire`] -- Watch stream messages

pub mod filter;
pub mod ids;
pub mod kinds;
pub mod record;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use filter::{Filter, Predicate};
pub use ids::{RecordId, SubscriptionId};
pub use kinds::{Kind, WatchEventType};
pub use record::{ModelRecord, Ref};
pub use wire::{MessageType, WatchMessage};
