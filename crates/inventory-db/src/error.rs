//! Error types for the data layer.
//!
//! All store failures are propagated via [`DbError`]. Callers distinguish
//! [`DbError::NotFound`] (an absent record, a client error) from every
//! other variant (a store failure, reported as an internal error).

use inventory_types::{Kind, RecordId};

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The requested record does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of the missing record.
        kind: Kind,
        /// ID of the missing record.
        id: RecordId,
    },

    /// A record with the same `(kind, id)` already exists.
    #[error("{kind} {id} already exists")]
    AlreadyExists {
        /// Kind of the conflicting record.
        kind: Kind,
        /// ID of the conflicting record.
        id: RecordId,
    },

    /// The store could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// The change feed was already handed to another consumer.
    #[error("change feed already taken")]
    FeedTaken,
}

impl DbError {
    /// Whether this error means "record absent" rather than a failure.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
