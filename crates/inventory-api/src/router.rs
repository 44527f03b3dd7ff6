//! Axum router construction for the inventory API.
//!
//! Assembles the provider-scoped REST routes (and the watch upgrade that
//! rides on the collection route) into a single [`Router`] with CORS and
//! request tracing enabled.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::tree;

/// Build the complete Axum router for the inventory server.
///
/// The router includes:
/// - `GET /providers/{provider}/tree` -- not listable (405)
/// - `GET /providers/{provider}/tree/{view}` -- materialized tree view
/// - `GET /providers/{provider}/{collection}` -- list, or watch with `X-Watch`
/// - `GET /providers/{provider}/{collection}/{id}` -- single resource
///
/// The static `tree` segment takes precedence over the `{collection}`
/// parameter, so there is no `trees` collection to shadow it.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Trees
        .route("/providers/{provider}/tree", get(handlers::tree_collection))
        .route("/providers/{provider}/tree/{view}", get(tree::get_tree))
        // Collections and items
        .route(
            "/providers/{provider}/{collection}",
            get(handlers::list_collection),
        )
        .route(
            "/providers/{provider}/{collection}/{id}",
            get(handlers::get_resource),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
