//! Error types for the inventory API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Errors
//! raised before a watch upgrade are ordinary responses; after the upgrade
//! failures close the stream instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory_core::{TreeError, WatchError};
use inventory_db::DbError;
use inventory_types::Kind;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested provider, collection or resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is malformed or asks for something the route does not do.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The route exists but does not serve this operation.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The kind has no change feed.
    #[error("kind {0} cannot be watched")]
    UnsupportedKind(Kind),

    /// The watch manager is shutting down.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The store failed.
    #[error("store error: {0}")]
    Store(DbError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { kind, id } => Self::NotFound(format!("{kind} {id}")),
            other => Self::Store(other),
        }
    }
}

impl From<TreeError> for ApiError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::Store { source } => Self::Store(source),
            depth @ TreeError::DepthExceeded { .. } => Self::Internal(depth.to_string()),
        }
    }
}

impl From<WatchError> for ApiError {
    fn from(e: WatchError) -> Self {
        match e {
            WatchError::UnsupportedKind(kind) => Self::UnsupportedKind(kind),
            WatchError::Store { source } => Self::Store(source),
            WatchError::ShuttingDown => Self::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::UnsupportedKind(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) | Self::Internal(_) | Self::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use inventory_types::RecordId;

    use super::*;

    #[test]
    fn store_not_found_is_a_client_error() {
        let err = ApiError::from(DbError::NotFound {
            kind: Kind::Host,
            id: RecordId::from("h9"),
        });
        assert!(matches!(err, ApiError::NotFound(ref msg) if msg == "Host h9"));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_failure_is_internal() {
        let err = ApiError::from(DbError::Unavailable("disk".to_owned()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unsupported_kind_is_bad_request() {
        let err = ApiError::from(WatchError::UnsupportedKind(Kind::Network));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn depth_overrun_is_internal() {
        let err = ApiError::from(TreeError::DepthExceeded {
            max_depth: 2,
            kind: Kind::Folder,
            id: RecordId::from("f1"),
        });
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
