//! Tree materialization and watch distribution for the inventory service.
//!
//! This crate holds the two engines that derive views from the flat store,
//! plus the service configuration they are tuned by.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`resource`] -- Record shaping into REST resources (stub vs full)
//! - [`tree`] -- Navigators, node builders and the arena forest
//! - [`watch`] -- Subscriptions, fan-out and backpressure

pub mod config;
pub mod resource;
pub mod tree;
pub mod watch;

pub use config::{ConfigError, InventoryConfig};
pub use resource::{DetailPolicy, Links, ShaperRegistry, path_match_root, resolve_path};
pub use tree::{Forest, TreeBuilder, TreeError, TreeView};
pub use watch::{CloseReason, Delivery, Subscription, WatchError, WatchEvent, WatchManager};
