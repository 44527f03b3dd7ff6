//! Tree endpoints.
//!
//! `GET /providers/{provider}/tree/{view}` materializes the named view
//! from the store and returns it as nested `{kind, object, children}`
//! nodes. Trees are one-shot; asking to watch one is a bad request.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use inventory_core::tree::{RelationNavigator, ShapingNodeBuilder};
use inventory_core::{Forest, TreeBuilder, TreeView};
use tracing::debug;

use crate::error::ApiError;
use crate::handlers::{WATCH_HEADER, check_provider, wants_detail};
use crate::state::AppState;

/// Everything a tree request resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRequest {
    /// Which hierarchy to build.
    pub view: TreeView,
    /// Whether the view's detail kinds carry full content.
    pub detail: bool,
}

impl TreeRequest {
    /// Resolve path and query into a request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown provider or view.
    pub fn resolve(
        state: &AppState,
        provider: &str,
        view: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Self, ApiError> {
        check_provider(state, provider)?;
        let view = TreeView::from_segment(view)
            .ok_or_else(|| ApiError::NotFound(format!("tree {view}")))?;
        Ok(Self {
            view,
            detail: wants_detail(params),
        })
    }

    /// Build the forest.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Store`] if any store read fails and
    /// [`ApiError::Internal`] if the hierarchy is deeper than allowed. No
    /// partial forest is produced.
    pub fn build(self, state: &AppState) -> Result<Forest, ApiError> {
        let relations = self.view.relations();
        let navigator = RelationNavigator::new(state.store.as_ref(), &relations);
        let nodes = ShapingNodeBuilder::new(
            &state.shapers,
            &state.links,
            self.view.detail_policy(self.detail),
        );
        let roots = self.view.roots(state.store.as_ref())?;
        let forest = TreeBuilder::new(state.tree.max_depth).build(&roots, &navigator, &nodes)?;
        debug!(view = ?self.view, nodes = forest.len(), "tree materialized");
        Ok(forest)
    }
}

/// Materialize a tree view.
pub async fn get_tree(
    State(state): State<Arc<AppState>>,
    Path((provider, view)): Path<(String, String)>,
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Forest>, ApiError> {
    if headers.contains_key(WATCH_HEADER) {
        return Err(ApiError::BadRequest("trees cannot be watched".to_owned()));
    }
    let request = TreeRequest::resolve(&state, &provider, &view, &params)?;
    Ok(Json(request.build(&state)?))
}
