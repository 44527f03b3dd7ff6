//! Watch subscriptions over the store's change feed.
//!
//! A watch hands a client the current filtered view of one kind, then every
//! later change to that view, with no gap and no duplicate between the two.
//!
//! # Architecture
//!
//! ```text
//! Store mutation (write lock held):
//!   revision += 1 -> feed.send(StoreEvent)          [revision order]
//!                          │
//! Dispatcher task:         ▼
//!   feed.recv() -> registry[kind] -> classify(filter) -> try_send(queue)
//!                                                            │
//! Subscription:                                              ▼
//!   snapshot records -> Parity(R) -> queued events with sequence > R
//! ```
//!
//! A subscription is registered before its snapshot is read. Any mutation
//! not reflected in the snapshot therefore has a revision above the
//! snapshot revision `R` and reaches the subscription's queue; anything at
//! or below `R` is discarded. Each queue is bounded: a subscriber that
//! falls behind is closed as a slow consumer instead of stalling the
//! dispatcher.

pub mod manager;
pub mod phase;
pub mod subscription;
pub mod transition;

use inventory_db::{DbError, Revision};
use inventory_types::{Kind, ModelRecord, WatchEventType};

pub use manager::WatchManager;
pub use phase::Phase;
pub use subscription::Subscription;
pub use transition::classify;

/// Errors returned when opening a watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// No change feed is published for the kind.
    #[error("kind {0} cannot be watched")]
    UnsupportedKind(Kind),

    /// The initial snapshot read failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: DbError,
    },

    /// The manager is shutting down and accepts no new subscriptions.
    #[error("watch manager is shutting down")]
    ShuttingDown,
}

/// Why a subscription ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The subscriber unsubscribed or went away.
    Unsubscribed,
    /// The subscriber's queue overflowed.
    SlowConsumer,
    /// The manager shut down.
    Shutdown,
    /// The store's change feed ended.
    FeedClosed,
}

impl CloseReason {
    /// Close reason as sent to clients.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsubscribed => "unsubscribed",
            Self::SlowConsumer => "slow consumer",
            Self::Shutdown => "shutdown",
            Self::FeedClosed => "store error",
        }
    }
}

impl core::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to a watched view.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    /// Store revision of the change. Strictly increasing per subscription.
    pub sequence: Revision,
    /// Effect on the watched view.
    pub event_type: WatchEventType,
    /// The record after the change, or before it for `Deleted`.
    pub resource: ModelRecord,
}

/// One item delivered by [`Subscription::next`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A record in the initial view, stamped with the snapshot revision.
    Snapshot {
        /// The snapshot revision.
        sequence: Revision,
        /// The matching record.
        record: ModelRecord,
    },
    /// The initial view is complete as of this revision.
    Parity(Revision),
    /// A change after the snapshot.
    Event(WatchEvent),
}
