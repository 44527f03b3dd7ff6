//! Subscription registry and change fan-out.
//!
//! The registry maps each kind to its open subscriptions. Membership
//! changes take a shard lock; delivery clones the subscriber list out of the
//! map and sends with `try_send`, so no lock is held while events move and
//! a full queue never blocks the dispatcher.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use inventory_db::{EventSource, Feed, StoreEvent};
use inventory_types::{Filter, Kind};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::WatchConfig;
use crate::watch::phase::Phase;
use crate::watch::subscription::{Shared, Subscription};
use crate::watch::{CloseReason, WatchError, classify};

/// Manager state shared with the dispatcher task and every subscription.
pub(crate) struct Inner {
    source: Arc<dyn EventSource>,
    registry: DashMap<Kind, Vec<Arc<Shared>>>,
    kinds: BTreeSet<Kind>,
    queue_capacity: usize,
    shutdown: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("kinds", &self.kinds)
            .field("queue_capacity", &self.queue_capacity)
            .field("subscriptions", &self.registry.len())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn register(&self, shared: Arc<Shared>) {
        self.registry.entry(shared.kind).or_default().push(shared);
    }

    /// Remove a subscription from the registry. Removing one that is not
    /// registered is a no-op.
    pub(crate) fn deregister(&self, shared: &Shared) {
        self.registry.remove_if_mut(&shared.kind, |_kind, subscribers| {
            subscribers.retain(|s| s.id != shared.id);
            subscribers.is_empty()
        });
    }

    fn evict(&self, shared: &Shared, reason: CloseReason) {
        shared.close(reason);
        self.deregister(shared);
    }

    fn close_all(&self, reason: CloseReason) {
        let all: Vec<Arc<Shared>> = self
            .registry
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        self.registry.clear();
        for shared in &all {
            shared.close(reason);
        }
        debug!(count = all.len(), %reason, "all subscriptions closed");
    }

    fn fan_out(&self, event: &StoreEvent) {
        let Some(subscribers) = self.registry.get(&event.kind).map(|e| e.value().clone()) else {
            return;
        };
        for shared in subscribers {
            if shared.is_closed() || event.revision <= shared.floor() {
                continue;
            }
            let Some(delta) = classify(&shared.filter, event) else {
                continue;
            };
            match shared.sender.try_send(delta) {
                Ok(()) => trace!(
                    subscription_id = %shared.id,
                    revision = event.revision,
                    "event queued"
                ),
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscription_id = %shared.id,
                        kind = %shared.kind,
                        capacity = self.queue_capacity,
                        "subscriber queue full, disconnecting slow consumer"
                    );
                    self.evict(&shared, CloseReason::SlowConsumer);
                }
                Err(TrySendError::Closed(_)) => self.evict(&shared, CloseReason::Unsubscribed),
            }
        }
    }
}

async fn dispatch(inner: Arc<Inner>, mut feed: Feed) {
    info!("watch dispatcher started");
    loop {
        let received = tokio::select! {
            biased;
            () = inner.shutdown.cancelled() => break,
            event = feed.recv() => event,
        };
        let Some(event) = received else {
            warn!("store change feed ended");
            inner.shutdown.cancel();
            inner.close_all(CloseReason::FeedClosed);
            break;
        };
        inner.fan_out(&event);
    }
    info!("watch dispatcher stopped");
}

/// Opens subscriptions and feeds them from the store's change feed.
///
/// Cloning is cheap; clones share the registry and dispatcher.
#[derive(Debug, Clone)]
pub struct WatchManager {
    inner: Arc<Inner>,
}

impl WatchManager {
    /// Take the change feed from `source` and start the dispatcher task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Store`] if the feed cannot be taken.
    pub fn start(source: Arc<dyn EventSource>, config: &WatchConfig) -> Result<Self, WatchError> {
        let feed = source.take_feed()?;
        let inner = Arc::new(Inner {
            source,
            registry: DashMap::new(),
            kinds: config.kinds.iter().copied().collect(),
            queue_capacity: config.queue_capacity.max(1),
            shutdown: CancellationToken::new(),
            dispatcher: Mutex::new(None),
        });

        let handle = tokio::spawn(dispatch(Arc::clone(&inner), feed));
        if let Ok(mut slot) = inner.dispatcher.lock() {
            *slot = Some(handle);
        }

        info!(
            kinds = inner.kinds.len(),
            queue_capacity = inner.queue_capacity,
            "watch manager started"
        );
        Ok(Self { inner })
    }

    /// Open a watch on `kind` restricted by `filter`.
    ///
    /// The subscription is registered before the snapshot is read, so no
    /// change committed after the snapshot can be missed.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::UnsupportedKind`] if `kind` has no change
    /// feed, [`WatchError::Store`] if the snapshot read fails, or
    /// [`WatchError::ShuttingDown`] after [`WatchManager::shutdown`].
    pub fn subscribe(&self, kind: Kind, filter: Filter) -> Result<Subscription, WatchError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(WatchError::ShuttingDown);
        }
        if !self.inner.kinds.contains(&kind) || !self.inner.source.watchable(kind) {
            return Err(WatchError::UnsupportedKind(kind));
        }

        let floor = self.inner.source.revision()?;
        let (sender, receiver) = mpsc::channel(self.inner.queue_capacity);
        let shared = Arc::new(Shared::new(kind, filter, sender));
        shared.set_floor(floor);
        self.inner.register(Arc::clone(&shared));

        if self.inner.shutdown.is_cancelled() {
            self.inner.evict(&shared, CloseReason::Shutdown);
            return Err(WatchError::ShuttingDown);
        }
        shared.advance(Phase::Negotiating, Phase::Snapshotting);

        let snapshot = match self.inner.source.snapshot(kind, &shared.filter) {
            Ok(snapshot) => snapshot,
            Err(source) => {
                self.inner.evict(&shared, CloseReason::Unsubscribed);
                warn!(%kind, error = %source, "watch snapshot failed");
                return Err(WatchError::Store { source });
            }
        };
        shared.set_floor(snapshot.revision);

        info!(
            subscription_id = %shared.id,
            %kind,
            records = snapshot.records.len(),
            revision = snapshot.revision,
            "subscription opened"
        );
        Ok(Subscription::new(
            shared,
            Arc::clone(&self.inner),
            snapshot.records,
            snapshot.revision,
            receiver,
        ))
    }

    /// Number of open subscriptions across all kinds.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of open subscriptions on `kind`.
    pub fn subscribers_of(&self, kind: Kind) -> usize {
        self.inner.registry.get(&kind).map_or(0, |entry| entry.value().len())
    }

    /// Whether `kind` can be watched.
    pub fn supports(&self, kind: Kind) -> bool {
        self.inner.kinds.contains(&kind) && self.inner.source.watchable(kind)
    }

    /// Token cancelled when the manager shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Stop the dispatcher and close every subscription with
    /// [`CloseReason::Shutdown`]. Later calls are no-ops.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.close_all(CloseReason::Shutdown);

        let handle = self.inner.dispatcher.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "watch dispatcher task failed");
            }
            info!("watch manager stopped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use inventory_db::{Change, DbError, MemoryStore, Revision, Snapshot};
    use inventory_types::{ModelRecord, WatchEventType};
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::time::timeout;

    use super::*;
    use crate::watch::Delivery;

    const WAIT: Duration = Duration::from_secs(5);

    fn config(queue_capacity: usize) -> WatchConfig {
        WatchConfig {
            queue_capacity,
            kinds: Kind::ALL.to_vec(),
        }
    }

    fn host(id: &str, cluster: &str) -> ModelRecord {
        ModelRecord::new(Kind::Host, id, id).with_field("cluster", cluster)
    }

    async fn next(subscription: &mut Subscription) -> Option<Delivery> {
        timeout(WAIT, subscription.next()).await.unwrap()
    }

    async fn next_event(subscription: &mut Subscription) -> crate::watch::WatchEvent {
        match next(subscription).await {
            Some(Delivery::Event(event)) => event,
            other => panic!("Expected event, got {other:?}"),
        }
    }

    /// An event source whose snapshot can be made to fail, can race a
    /// burst of writes, and whose feed can be ended by the test.
    struct ScriptedSource {
        fail_snapshot: bool,
        burst: Revision,
        feed: Mutex<Option<UnboundedSender<StoreEvent>>>,
    }

    impl ScriptedSource {
        fn new(fail_snapshot: bool) -> Self {
            Self {
                fail_snapshot,
                burst: 0,
                feed: Mutex::new(None),
            }
        }

        /// Revisions `1..=burst` are published while the snapshot is read.
        fn with_burst(burst: Revision) -> Self {
            Self {
                burst,
                ..Self::new(false)
            }
        }

        fn publish(&self, revision: Revision) {
            let id = format!("h{revision}");
            let event = StoreEvent {
                revision,
                kind: Kind::Host,
                change: Change::Created,
                previous: None,
                current: Some(host(&id, "c1")),
            };
            if let Some(feed) = self.feed.lock().unwrap().as_ref() {
                feed.send(event).unwrap();
            }
        }

        fn end_feed(&self) {
            self.feed.lock().unwrap().take();
        }
    }

    impl EventSource for ScriptedSource {
        fn watchable(&self, kind: Kind) -> bool {
            kind == Kind::Host
        }

        fn revision(&self) -> Result<Revision, DbError> {
            Ok(0)
        }

        fn snapshot(&self, _kind: Kind, _filter: &Filter) -> Result<Snapshot, DbError> {
            if self.fail_snapshot {
                return Err(DbError::Unavailable("replica offline".to_owned()));
            }
            for revision in 1..=self.burst {
                self.publish(revision);
            }
            if self.burst > 0 {
                // Let the dispatcher queue the burst before the read returns.
                std::thread::sleep(Duration::from_millis(50));
            }
            Ok(Snapshot {
                records: Vec::new(),
                revision: self.burst,
            })
        }

        fn take_feed(&self) -> Result<Feed, DbError> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.feed.lock().unwrap() = Some(tx);
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn snapshot_then_created_after_parity() {
        let store = Arc::new(MemoryStore::new());
        store.load([host("h1", "c1"), host("h2", "c1")]).unwrap();
        let manager = WatchManager::start(store.clone(), &config(16)).unwrap();

        let mut sub = manager.subscribe(Kind::Host, Filter::all()).unwrap();
        let snapshot_rev = sub.revision();
        assert_eq!(sub.phase(), Phase::Snapshotting);

        let mut snapshot_ids = Vec::new();
        for _ in 0..2 {
            match next(&mut sub).await {
                Some(Delivery::Snapshot { sequence, record }) => {
                    assert_eq!(sequence, snapshot_rev);
                    snapshot_ids.push(record.id.0);
                }
                other => panic!("Expected snapshot, got {other:?}"),
            }
        }
        assert_eq!(snapshot_ids, vec!["h1", "h2"]);
        assert_eq!(next(&mut sub).await, Some(Delivery::Parity(snapshot_rev)));
        assert_eq!(sub.phase(), Phase::Streaming);

        store.create(host("h3", "c1")).unwrap();
        let event = next_event(&mut sub).await;
        assert_eq!(event.event_type, WatchEventType::Created);
        assert_eq!(event.resource.id.as_str(), "h3");
        assert!(event.sequence > snapshot_rev);

        manager.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn no_gap_or_duplicate_under_concurrent_writes() {
        let store = Arc::new(MemoryStore::new());
        let manager = WatchManager::start(store.clone(), &config(1024)).unwrap();

        let writer_store = Arc::clone(&store);
        let writer = tokio::spawn(async move {
            for i in 0..200_u32 {
                writer_store
                    .create(ModelRecord::new(Kind::Host, format!("h{i:03}"), "esx"))
                    .unwrap();
                if i % 8 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        });
        tokio::task::yield_now().await;
        let mut sub = manager.subscribe(Kind::Host, Filter::all()).unwrap();
        writer.await.unwrap();
        store
            .create(ModelRecord::new(Kind::Host, "zz-sentinel", "done"))
            .unwrap();

        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        let mut last = 0;
        loop {
            match next(&mut sub).await {
                Some(Delivery::Snapshot { record, .. }) => {
                    *seen.entry(record.id.0).or_default() += 1;
                }
                Some(Delivery::Parity(revision)) => last = revision,
                Some(Delivery::Event(event)) => {
                    assert!(event.sequence > last);
                    last = event.sequence;
                    assert_eq!(event.event_type, WatchEventType::Created);
                    if event.resource.id.as_str() == "zz-sentinel" {
                        break;
                    }
                    *seen.entry(event.resource.id.0).or_default() += 1;
                }
                None => panic!("Subscription closed early: {:?}", sub.close_reason()),
            }
        }

        assert_eq!(seen.len(), 200);
        assert!(seen.values().all(|count| *count == 1));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn filter_transitions_synthesize_created_and_deleted() {
        let store = Arc::new(MemoryStore::new());
        store.load([host("h1", "c2")]).unwrap();
        let manager = WatchManager::start(store.clone(), &config(16)).unwrap();

        let mut sub = manager.subscribe(Kind::Host, Filter::eq("cluster", "c1")).unwrap();
        assert!(matches!(next(&mut sub).await, Some(Delivery::Parity(_))));

        store.update(host("h1", "c1")).unwrap();
        store
            .update(host("h1", "c1").with_field("inMaintenance", true))
            .unwrap();
        store.update(host("h1", "c2")).unwrap();
        store
            .update(host("h1", "c2").with_field("inMaintenance", false))
            .unwrap();
        store.create(host("h9", "c1")).unwrap();

        let created = next_event(&mut sub).await;
        assert_eq!(created.event_type, WatchEventType::Created);
        assert_eq!(created.resource.field("cluster"), Some(serde_json::json!("c1")));

        let updated = next_event(&mut sub).await;
        assert_eq!(updated.event_type, WatchEventType::Updated);

        let deleted = next_event(&mut sub).await;
        assert_eq!(deleted.event_type, WatchEventType::Deleted);
        assert_eq!(deleted.resource.field("cluster"), Some(serde_json::json!("c1")));

        let sentinel = next_event(&mut sub).await;
        assert_eq!(sentinel.resource.id.as_str(), "h9");
        assert!(sentinel.sequence > deleted.sequence);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn slow_consumer_is_closed_without_stalling_others() {
        let store = Arc::new(MemoryStore::new());
        let manager = WatchManager::start(store.clone(), &config(4)).unwrap();

        let slow = manager.subscribe(Kind::Host, Filter::all()).unwrap();
        let mut fast = manager.subscribe(Kind::Host, Filter::all()).unwrap();
        assert!(matches!(next(&mut fast).await, Some(Delivery::Parity(_))));

        for i in 0..10_u32 {
            store.create(host(&format!("h{i}"), "c1")).unwrap();
            let event = next_event(&mut fast).await;
            assert_eq!(event.resource.id.0, format!("h{i}"));
        }

        assert_eq!(slow.close_reason(), Some(CloseReason::SlowConsumer));
        assert_eq!(slow.phase(), Phase::Closed);
        assert_eq!(fast.close_reason(), None);
        assert_eq!(manager.subscriber_count(), 1);

        let mut slow = slow;
        assert_eq!(next(&mut slow).await, None);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn unwatchable_kind_is_rejected() {
        let store = Arc::new(MemoryStore::with_watchable([Kind::Host]));
        let manager = WatchManager::start(store, &config(4)).unwrap();

        let result = manager.subscribe(Kind::Vm, Filter::all());
        assert!(matches!(result, Err(WatchError::UnsupportedKind(Kind::Vm))));
        assert!(manager.supports(Kind::Host));
        assert!(!manager.supports(Kind::Vm));

        let narrowed = WatchConfig {
            queue_capacity: 4,
            kinds: vec![Kind::Vm],
        };
        let other = WatchManager::start(Arc::new(MemoryStore::new()), &narrowed).unwrap();
        assert!(matches!(
            other.subscribe(Kind::Host, Filter::all()),
            Err(WatchError::UnsupportedKind(Kind::Host))
        ));
    }

    #[tokio::test]
    async fn snapshot_failure_is_a_store_error() {
        let source = Arc::new(ScriptedSource::new(true));
        let manager = WatchManager::start(source, &config(4)).unwrap();

        let result = manager.subscribe(Kind::Host, Filter::all());
        assert!(matches!(result, Err(WatchError::Store { .. })));
        assert_eq!(manager.subscriber_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn writes_during_snapshot_do_not_hold_queue_capacity() {
        let source = Arc::new(ScriptedSource::with_burst(2));
        let manager = WatchManager::start(source.clone(), &config(2)).unwrap();

        let mut sub = manager.subscribe(Kind::Host, Filter::all()).unwrap();
        assert_eq!(sub.revision(), 2);
        source.publish(3);
        source.publish(4);

        match next(&mut sub).await {
            Some(Delivery::Parity(2)) => {}
            other => panic!("Expected parity at 2, got {other:?}"),
        }
        assert_eq!(next_event(&mut sub).await.sequence, 3);
        assert_eq!(next_event(&mut sub).await.sequence, 4);
        assert_eq!(sub.close_reason(), None);
    }

    #[tokio::test]
    async fn feed_can_only_be_taken_once() {
        let store = Arc::new(MemoryStore::new());
        let _manager = WatchManager::start(store.clone(), &config(4)).unwrap();
        assert!(matches!(
            WatchManager::start(store, &config(4)),
            Err(WatchError::Store {
                source: DbError::FeedTaken
            })
        ));
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let manager = WatchManager::start(store.clone(), &config(4)).unwrap();

        let mut sub = manager.subscribe(Kind::Host, Filter::all()).unwrap();
        let other = manager.subscribe(Kind::Host, Filter::all()).unwrap();
        assert_eq!(manager.subscribers_of(Kind::Host), 2);

        store.create(host("h1", "c1")).unwrap();
        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(sub.close_reason(), Some(CloseReason::Unsubscribed));
        assert_eq!(sub.phase(), Phase::Closed);
        assert_eq!(next(&mut sub).await, None);
        assert_eq!(manager.subscribers_of(Kind::Host), 1);

        drop(sub);
        drop(other);
        assert_eq!(manager.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_subscriptions_and_refuses_new_ones() {
        let store = Arc::new(MemoryStore::new());
        let manager = WatchManager::start(store, &config(4)).unwrap();
        let mut sub = manager.subscribe(Kind::Host, Filter::all()).unwrap();

        manager.shutdown().await;
        manager.shutdown().await;

        assert_eq!(next(&mut sub).await, None);
        assert_eq!(sub.close_reason(), Some(CloseReason::Shutdown));
        assert!(manager.shutdown_token().is_cancelled());
        assert!(matches!(
            manager.subscribe(Kind::Host, Filter::all()),
            Err(WatchError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn ended_feed_closes_subscriptions() {
        let source = Arc::new(ScriptedSource::new(false));
        let manager = WatchManager::start(source.clone(), &config(4)).unwrap();
        let mut sub = manager.subscribe(Kind::Host, Filter::all()).unwrap();
        assert_eq!(next(&mut sub).await, Some(Delivery::Parity(0)));

        source.end_feed();

        assert_eq!(next(&mut sub).await, None);
        assert_eq!(sub.close_reason(), Some(CloseReason::FeedClosed));
        assert_eq!(CloseReason::FeedClosed.as_str(), "store error");
    }
}
