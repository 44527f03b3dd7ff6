//! The consumer side of a watch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use inventory_db::Revision;
use inventory_types::{Filter, Kind, ModelRecord, SubscriptionId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::watch::manager::Inner;
use crate::watch::phase::{Phase, PhaseCell};
use crate::watch::{CloseReason, Delivery, WatchEvent};

/// Subscription state shared with the dispatcher.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) id: SubscriptionId,
    pub(crate) kind: Kind,
    pub(crate) filter: Filter,
    pub(crate) sender: mpsc::Sender<WatchEvent>,
    /// Events at or below this revision are already in the snapshot.
    floor: AtomicU64,
    phase: PhaseCell,
    reason: OnceLock<CloseReason>,
    closed: CancellationToken,
    opened_at: DateTime<Utc>,
}

impl Shared {
    pub(crate) fn new(kind: Kind, filter: Filter, sender: mpsc::Sender<WatchEvent>) -> Self {
        Self {
            id: SubscriptionId::new(),
            kind,
            filter,
            sender,
            floor: AtomicU64::new(0),
            phase: PhaseCell::new(),
            reason: OnceLock::new(),
            closed: CancellationToken::new(),
            opened_at: Utc::now(),
        }
    }

    pub(crate) fn floor(&self) -> Revision {
        self.floor.load(Ordering::Acquire)
    }

    pub(crate) fn set_floor(&self, revision: Revision) {
        self.floor.store(revision, Ordering::Release);
    }

    pub(crate) fn advance(&self, from: Phase, to: Phase) -> bool {
        self.phase.advance(from, to)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Close with `reason`. Only the first call has any effect.
    pub(crate) fn close(&self, reason: CloseReason) -> bool {
        if !self.phase.close() {
            return false;
        }
        let _ = self.reason.set(reason);
        self.closed.cancel();
        let open_ms = Utc::now()
            .signed_duration_since(self.opened_at)
            .num_milliseconds();
        info!(
            subscription_id = %self.id,
            kind = %self.kind,
            %reason,
            open_ms,
            "subscription closed"
        );
        true
    }
}

/// An open watch on one kind.
///
/// [`Subscription::next`] yields every snapshot record, then a single
/// [`Delivery::Parity`] at the snapshot revision, then change events with
/// strictly increasing sequences. It returns `None` once the subscription
/// is closed, after which [`Subscription::close_reason`] says why.
///
/// Dropping the subscription unsubscribes it.
#[derive(Debug)]
pub struct Subscription {
    shared: Arc<Shared>,
    manager: Arc<Inner>,
    snapshot: VecDeque<ModelRecord>,
    revision: Revision,
    cursor: Revision,
    parity_pending: bool,
    /// First queued event past the snapshot, taken out while draining.
    pending: Option<WatchEvent>,
    receiver: mpsc::Receiver<WatchEvent>,
}

impl Subscription {
    pub(crate) fn new(
        shared: Arc<Shared>,
        manager: Arc<Inner>,
        snapshot: Vec<ModelRecord>,
        revision: Revision,
        mut receiver: mpsc::Receiver<WatchEvent>,
    ) -> Self {
        // Events queued while the snapshot was read are in revision order;
        // release the ones it already covers so they do not hold capacity.
        let mut pending = None;
        while let Ok(event) = receiver.try_recv() {
            if event.sequence > revision {
                pending = Some(event);
                break;
            }
        }
        Self {
            shared,
            manager,
            snapshot: snapshot.into(),
            revision,
            cursor: revision,
            parity_pending: true,
            pending,
            receiver,
        }
    }

    /// Subscription identifier.
    pub fn id(&self) -> SubscriptionId {
        self.shared.id
    }

    /// The watched kind.
    pub fn kind(&self) -> Kind {
        self.shared.kind
    }

    /// The filter applied to the snapshot and to every event.
    pub fn filter(&self) -> &Filter {
        &self.shared.filter
    }

    /// Revision the snapshot was taken at.
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.phase.get()
    }

    /// Why the subscription closed, once it has.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.reason.get().copied()
    }

    /// The next delivery, waiting for a change if the snapshot is done.
    ///
    /// Cancel-safe: dropping the future loses nothing.
    pub async fn next(&mut self) -> Option<Delivery> {
        if self.shared.is_closed() {
            return None;
        }
        if let Some(record) = self.snapshot.pop_front() {
            return Some(Delivery::Snapshot {
                sequence: self.revision,
                record,
            });
        }
        if self.parity_pending {
            self.parity_pending = false;
            self.shared.advance(Phase::Snapshotting, Phase::Streaming);
            return Some(Delivery::Parity(self.revision));
        }
        if let Some(event) = self.pending.take() {
            self.cursor = event.sequence;
            return Some(Delivery::Event(event));
        }
        loop {
            let received = tokio::select! {
                biased;
                () = self.shared.closed.cancelled() => return None,
                event = self.receiver.recv() => event,
            };
            let event = received?;
            if event.sequence <= self.cursor {
                continue;
            }
            self.cursor = event.sequence;
            return Some(Delivery::Event(event));
        }
    }

    /// Close the subscription, discard anything queued and deregister it.
    /// Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        self.shared.close(CloseReason::Unsubscribed);
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
        self.pending = None;
        self.snapshot.clear();
        self.manager.deregister(&self.shared);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
