//! Store contract consumed by the tree and watch engines.
//!
//! [`Store`] covers one-shot reads. [`EventSource`] adds what a watch
//! needs: a filtered snapshot stamped with the store revision it reflects,
//! and a forward-only feed of [`StoreEvent`]s in revision order.
//!
//! The two compose without a gap: every mutation carries a revision from a
//! single store-wide counter, a snapshot at revision `R` reflects exactly
//! the mutations `<= R`, and the feed carries every mutation in order. A
//! consumer that starts listening to the feed before taking the snapshot
//! and discards events `<= R` sees each later mutation exactly once.

use inventory_types::{Filter, Kind, ModelRecord, RecordId};
use tokio::sync::mpsc;

use crate::error::DbError;

/// A store-wide, monotonically increasing mutation counter.
pub type Revision = u64;

/// Consistent point-in-time listing of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Records matching the filter, in store order.
    pub records: Vec<ModelRecord>,
    /// Revision of the last mutation reflected in `records`.
    pub revision: Revision,
}

/// The store-level change behind a [`StoreEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A record was inserted.
    Created,
    /// An existing record was replaced.
    Updated,
    /// A record was removed.
    Deleted,
}

/// One mutation as published on the change feed.
///
/// Both the pre- and post-mutation state are carried so subscribers can
/// evaluate their filter on either side of the change.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    /// Revision assigned to this mutation.
    pub revision: Revision,
    /// Kind of the mutated record.
    pub kind: Kind,
    /// What happened.
    pub change: Change,
    /// State before the mutation (`None` for a create).
    pub previous: Option<ModelRecord>,
    /// State after the mutation (`None` for a delete).
    pub current: Option<ModelRecord>,
}

/// Receiving half of the change feed.
pub type Feed = mpsc::UnboundedReceiver<StoreEvent>;

/// One-shot reads against the inventory.
pub trait Store: Send + Sync {
    /// List records of `kind` matching `filter`, in store order.
    ///
    /// # Errors
    ///
    /// Returns a [`DbError`] if the store cannot serve the read.
    fn list(&self, kind: Kind, filter: &Filter) -> Result<Vec<ModelRecord>, DbError>;

    /// Fetch a single record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the record is absent, or another
    /// [`DbError`] if the store cannot serve the read.
    fn get(&self, kind: Kind, id: &RecordId) -> Result<ModelRecord, DbError>;
}

/// Change notifications for watchable kinds.
pub trait EventSource: Send + Sync {
    /// Whether changes to `kind` are published on the feed.
    fn watchable(&self, kind: Kind) -> bool;

    /// The revision of the most recent mutation. A snapshot taken after
    /// this call reflects at least this revision.
    ///
    /// # Errors
    ///
    /// Returns a [`DbError`] if the read fails.
    fn revision(&self) -> Result<Revision, DbError>;

    /// Take a filtered snapshot stamped with its revision.
    ///
    /// # Errors
    ///
    /// Returns a [`DbError`] if the read fails.
    fn snapshot(&self, kind: Kind, filter: &Filter) -> Result<Snapshot, DbError>;

    /// Hand out the change feed. The feed has a single consumer.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::FeedTaken`] if the feed was already taken.
    fn take_feed(&self) -> Result<Feed, DbError>;
}
