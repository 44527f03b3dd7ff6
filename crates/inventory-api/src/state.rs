//! Shared application state for the inventory API server.
//!
//! [`AppState`] holds the store every handler reads from, the watch
//! manager that serves live subscriptions, and the shaping configuration
//! for the provider being served. Per-request decisions live in the
//! request contexts built by the handlers, never here.

use std::sync::Arc;

use inventory_core::config::{ProviderConfig, TreeConfig};
use inventory_core::{Links, ShaperRegistry, WatchManager};
use inventory_db::Store;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// One-shot reads for lists, items and trees.
    pub store: Arc<dyn Store>,
    /// Live subscriptions.
    pub watch: WatchManager,
    /// Kind -> resource shaper.
    pub shapers: Arc<ShaperRegistry>,
    /// Self-link builder for the served provider.
    pub links: Links,
    /// Tree build limits.
    pub tree: TreeConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("provider", &self.links.provider())
            .field("watch", &self.watch)
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create the state for `provider` with the standard shapers.
    pub fn new(
        store: Arc<dyn Store>,
        watch: WatchManager,
        provider: &ProviderConfig,
        tree: TreeConfig,
    ) -> Self {
        Self {
            store,
            watch,
            shapers: Arc::new(ShaperRegistry::standard()),
            links: Links::new(provider.uid.clone()),
            tree,
        }
    }

    /// The provider UID routes are served under.
    pub fn provider(&self) -> &str {
        self.links.provider()
    }
}
