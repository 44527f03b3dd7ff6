//! REST endpoint handlers for collections and items.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/providers/{p}/{collection}` | List, or watch with `X-Watch` |
//! | `GET` | `/providers/{p}/{collection}/{id}` | Single resource, full content |
//! | `GET` | `/providers/{p}/tree` | Not listable (405) |
//!
//! Query parameters other than `detail` are equality filters on record
//! fields (`?cluster=c1&name=esx-01`). `detail=1` or `detail=true`
//! returns full content in lists. A datastore `name` containing `/` is
//! matched against containment paths by root and leaf instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use inventory_core::{path_match_root, resolve_path};
use inventory_db::DbError;
use inventory_types::{Filter, Kind, ModelRecord, RecordId};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use crate::watch;

/// Header that turns a collection list into a watch.
pub const WATCH_HEADER: &str = "x-watch";

/// Query parameters that are never record filters.
const RESERVED_PARAMS: &[&str] = &["detail"];

/// Reserved parameters when `name` is a path rather than a field value.
const PATH_NAME_PARAMS: &[&str] = &["detail", "name"];

/// Whether `detail=1|true` was requested.
pub(crate) fn wants_detail(params: &BTreeMap<String, String>) -> bool {
    params
        .get("detail")
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Insert the containment `path` into a folder or datastore body. Other
/// kinds are left untouched.
///
/// # Errors
///
/// Returns a [`DbError`] if a parent lookup fails.
pub(crate) fn attach_path(
    state: &AppState,
    record: &ModelRecord,
    body: &mut serde_json::Value,
) -> Result<(), DbError> {
    if !matches!(record.kind, Kind::Folder | Kind::Datastore) {
        return Ok(());
    }
    let path = resolve_path(state.store.as_ref(), record, state.tree.max_depth)?;
    if let Some(object) = body.as_object_mut() {
        object.insert("path".to_owned(), serde_json::Value::from(path));
    }
    Ok(())
}

/// Reject requests for a provider other than the one being served.
pub(crate) fn check_provider(state: &AppState, provider: &str) -> Result<(), ApiError> {
    if provider == state.provider() {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("provider {provider}")))
    }
}

// ---------------------------------------------------------------------------
// Request context
// ---------------------------------------------------------------------------

/// Everything a collection request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRequest {
    /// The collection's kind.
    pub kind: Kind,
    /// Record filter from the query string.
    pub filter: Filter,
    /// Whether list entries carry full content.
    pub detail: bool,
    /// A datastore `name` holding a path, matched by root and leaf.
    pub path_name: Option<String>,
}

impl CollectionRequest {
    /// Resolve path and query into a request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown provider or collection.
    pub fn resolve(
        state: &AppState,
        provider: &str,
        collection: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Self, ApiError> {
        check_provider(state, provider)?;
        let kind = Kind::from_collection(collection)
            .ok_or_else(|| ApiError::NotFound(format!("collection {collection}")))?;
        let path_name = params
            .get("name")
            .filter(|name| kind == Kind::Datastore && name.contains('/'))
            .cloned();
        let reserved = if path_name.is_some() {
            PATH_NAME_PARAMS
        } else {
            RESERVED_PARAMS
        };
        Ok(Self {
            kind,
            filter: Filter::from_params(params, reserved),
            detail: wants_detail(params),
            path_name,
        })
    }
}

// ---------------------------------------------------------------------------
// GET /providers/{provider}/{collection}
// ---------------------------------------------------------------------------

/// List a collection, or open a watch on it when the `X-Watch` header is
/// present.
pub async fn list_collection(
    State(state): State<Arc<AppState>>,
    Path((provider, collection)): Path<(String, String)>,
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let request = CollectionRequest::resolve(&state, &provider, &collection, &params)?;

    if headers.contains_key(WATCH_HEADER) {
        return watch::negotiate(state, request, upgrade);
    }

    let mut records = state.store.list(request.kind, &request.filter)?;
    if let Some(name) = &request.path_name {
        records = match_path_root(&state, records, name)?;
    }
    debug!(kind = %request.kind, count = records.len(), "collection listed");

    let body: Vec<serde_json::Value> = records
        .iter()
        .map(|record| state.shapers.shape(record, request.detail, &state.links))
        .collect();
    Ok(Json(body).into_response())
}

/// Keep the records whose path shares root and leaf with `name`. A list
/// of fewer than two is returned as is.
fn match_path_root(
    state: &AppState,
    records: Vec<ModelRecord>,
    name: &str,
) -> Result<Vec<ModelRecord>, DbError> {
    if records.len() < 2 {
        return Ok(records);
    }
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        let path = resolve_path(state.store.as_ref(), &record, state.tree.max_depth)?;
        if path_match_root(&path, name) {
            kept.push(record);
        }
    }
    Ok(kept)
}

// ---------------------------------------------------------------------------
// GET /providers/{provider}/{collection}/{id}
// ---------------------------------------------------------------------------

/// Fetch one resource with full content. Folders and datastores also
/// carry their containment `path`.
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    Path((provider, collection, id)): Path<(String, String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_provider(&state, &provider)?;
    let kind = Kind::from_collection(&collection)
        .ok_or_else(|| ApiError::NotFound(format!("collection {collection}")))?;

    let record = state.store.get(kind, &RecordId::from(id))?;
    let mut body = state.shapers.shape(&record, true, &state.links);
    attach_path(&state, &record, &mut body)?;
    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// GET /providers/{provider}/tree
// ---------------------------------------------------------------------------

/// Trees are reached through a view (`/tree/cluster`, `/tree/folder`);
/// the bare collection is not listable.
pub async fn tree_collection(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Response, ApiError> {
    check_provider(&state, &provider)?;
    Err(ApiError::MethodNotAllowed(
        "the tree collection cannot be listed".to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_flag_accepts_one_and_true() {
        let mut params = BTreeMap::new();
        assert!(!wants_detail(&params));
        params.insert("detail".to_owned(), "1".to_owned());
        assert!(wants_detail(&params));
        params.insert("detail".to_owned(), "TRUE".to_owned());
        assert!(wants_detail(&params));
        params.insert("detail".to_owned(), "0".to_owned());
        assert!(!wants_detail(&params));
    }
}
