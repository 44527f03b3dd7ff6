//! In-memory revisioned store.
//!
//! [`MemoryStore`] keeps every record in a `BTreeMap` per kind (so list
//! order is by ID and deterministic) behind a single [`RwLock`]. Each
//! mutation takes the write lock, bumps the store revision, applies the
//! change and publishes the [`StoreEvent`] before releasing the lock, which
//! keeps feed order identical to revision order. Snapshots take the read
//! lock, so a snapshot and its revision always agree.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use inventory_types::{Filter, Kind, ModelRecord, RecordId};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::DbError;
use crate::store::{Change, EventSource, Feed, Revision, Snapshot, Store, StoreEvent};

/// Mutable state guarded by the store lock.
#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<Kind, BTreeMap<RecordId, ModelRecord>>,
    revision: Revision,
    feed: Option<mpsc::UnboundedSender<StoreEvent>>,
}

impl Tables {
    /// Assign the next revision and publish the change.
    fn commit(
        &mut self,
        kind: Kind,
        change: Change,
        previous: Option<ModelRecord>,
        current: Option<ModelRecord>,
    ) -> Revision {
        self.revision = self.revision.saturating_add(1);
        let revision = self.revision;

        if let Some(feed) = &self.feed {
            let event = StoreEvent {
                revision,
                kind,
                change,
                previous,
                current,
            };
            if feed.send(event).is_err() {
                trace!(revision, "change feed receiver dropped");
            }
        }

        revision
    }
}

/// An in-memory [`Store`] and [`EventSource`].
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    watchable: BTreeSet<Kind>,
}

impl MemoryStore {
    /// Create an empty store publishing changes for every kind.
    pub fn new() -> Self {
        Self::with_watchable(Kind::ALL)
    }

    /// Create an empty store publishing changes only for `kinds`.
    pub fn with_watchable(kinds: impl IntoIterator<Item = Kind>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            watchable: kinds.into_iter().collect(),
        }
    }

    /// The revision of the most recent mutation (0 for a fresh store).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Poisoned`] if the store lock is poisoned.
    pub fn revision(&self) -> Result<Revision, DbError> {
        Ok(self.read()?.revision)
    }

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::AlreadyExists`] if `(kind, id)` is taken.
    pub fn create(&self, record: ModelRecord) -> Result<Revision, DbError> {
        let mut tables = self.write()?;
        let table = tables.records.entry(record.kind).or_default();
        if table.contains_key(&record.id) {
            return Err(DbError::AlreadyExists {
                kind: record.kind,
                id: record.id,
            });
        }
        table.insert(record.id.clone(), record.clone());
        let kind = record.kind;
        let revision = tables.commit(kind, Change::Created, None, Some(record));
        debug!(%kind, revision, "record created");
        Ok(revision)
    }

    /// Replace an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the record does not exist.
    pub fn update(&self, record: ModelRecord) -> Result<Revision, DbError> {
        let mut tables = self.write()?;
        let previous = tables
            .records
            .get_mut(&record.kind)
            .and_then(|table| table.get_mut(&record.id))
            .map(|slot| std::mem::replace(slot, record.clone()))
            .ok_or_else(|| DbError::NotFound {
                kind: record.kind,
                id: record.id.clone(),
            })?;
        let kind = record.kind;
        let revision = tables.commit(kind, Change::Updated, Some(previous), Some(record));
        debug!(%kind, revision, "record updated");
        Ok(revision)
    }

    /// Insert or replace a record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Poisoned`] if the store lock is poisoned.
    pub fn upsert(&self, record: ModelRecord) -> Result<Revision, DbError> {
        let mut tables = self.write()?;
        let kind = record.kind;
        let previous = tables
            .records
            .entry(kind)
            .or_default()
            .insert(record.id.clone(), record.clone());
        let change = if previous.is_some() {
            Change::Updated
        } else {
            Change::Created
        };
        Ok(tables.commit(kind, change, previous, Some(record)))
    }

    /// Remove a record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the record does not exist.
    pub fn delete(&self, kind: Kind, id: &RecordId) -> Result<Revision, DbError> {
        let mut tables = self.write()?;
        let previous = tables
            .records
            .get_mut(&kind)
            .and_then(|table| table.remove(id))
            .ok_or_else(|| DbError::NotFound {
                kind,
                id: id.clone(),
            })?;
        let revision = tables.commit(kind, Change::Deleted, Some(previous), None);
        debug!(%kind, %id, revision, "record deleted");
        Ok(revision)
    }

    /// Bulk-load records, replacing any with the same `(kind, id)`.
    ///
    /// Returns the revision after the last record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Poisoned`] if the store lock is poisoned.
    pub fn load(
        &self,
        records: impl IntoIterator<Item = ModelRecord>,
    ) -> Result<Revision, DbError> {
        let mut revision = self.revision()?;
        for record in records {
            revision = self.upsert(record)?;
        }
        Ok(revision)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, DbError> {
        self.tables
            .read()
            .map_err(|e| DbError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, DbError> {
        self.tables
            .write()
            .map_err(|e| DbError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the records of `kind` matching `filter` from locked tables.
fn select(tables: &Tables, kind: Kind, filter: &Filter) -> Vec<ModelRecord> {
    tables
        .records
        .get(&kind)
        .map(|table| {
            table
                .values()
                .filter(|record| filter.matches(record))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

impl Store for MemoryStore {
    fn list(&self, kind: Kind, filter: &Filter) -> Result<Vec<ModelRecord>, DbError> {
        let tables = self.read()?;
        Ok(select(&tables, kind, filter))
    }

    fn get(&self, kind: Kind, id: &RecordId) -> Result<ModelRecord, DbError> {
        let tables = self.read()?;
        tables
            .records
            .get(&kind)
            .and_then(|table| table.get(id))
            .cloned()
            .ok_or_else(|| DbError::NotFound {
                kind,
                id: id.clone(),
            })
    }
}

impl EventSource for MemoryStore {
    fn watchable(&self, kind: Kind) -> bool {
        self.watchable.contains(&kind)
    }

    fn revision(&self) -> Result<Revision, DbError> {
        Self::revision(self)
    }

    fn snapshot(&self, kind: Kind, filter: &Filter) -> Result<Snapshot, DbError> {
        let tables = self.read()?;
        Ok(Snapshot {
            records: select(&tables, kind, filter),
            revision: tables.revision,
        })
    }

    fn take_feed(&self) -> Result<Feed, DbError> {
        let mut tables = self.write()?;
        if tables.feed.is_some() {
            return Err(DbError::FeedTaken);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        tables.feed = Some(tx);
        debug!(revision = tables.revision, "change feed attached");
        Ok(rx)
    }
}
