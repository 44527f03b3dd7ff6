//! REST resource shaping.
//!
//! Records leave the service as JSON resources. Every resource has a
//! reference stub (`id`, `kind`, `name`, `selfLink`); the full content adds
//! the kind's fields and the `parent` reference. Which form a kind takes is
//! governed by a [`DetailPolicy`], and how a kind is shaped is looked up in a
//! [`ShaperRegistry`] rather than switched on inline.

use std::collections::BTreeMap;
use std::sync::Arc;

use inventory_db::{DbError, Store};
use inventory_types::{Kind, ModelRecord, RecordId};
use serde_json::{Map, Value};

/// Builds self links for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links {
    provider: String,
}

impl Links {
    /// Links rooted at `/providers/{provider}`.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }

    /// The provider UID the links are rooted at.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// `/providers/{provider}/{collection}/{id}`.
    pub fn link(&self, kind: Kind, id: &RecordId) -> String {
        format!("/providers/{}/{}/{}", self.provider, kind.collection(), id)
    }
}

/// Shapes records of one kind into REST resources.
pub trait Shaper: Send + Sync {
    /// The reference stub: kind, identity and link.
    fn stub(&self, record: &ModelRecord, links: &Links) -> Value;

    /// The full content.
    fn full(&self, record: &ModelRecord, links: &Links) -> Value;
}

/// Field-projecting shaper.
///
/// With `fields` set, full content carries only the listed fields
/// (missing ones omitted); without it every record field is carried.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceShaper {
    fields: Option<&'static [&'static str]>,
}

impl ResourceShaper {
    /// Carry every record field.
    pub const fn all_fields() -> Self {
        Self { fields: None }
    }

    /// Carry only `fields`.
    pub const fn with_fields(fields: &'static [&'static str]) -> Self {
        Self {
            fields: Some(fields),
        }
    }
}

impl Shaper for ResourceShaper {
    fn stub(&self, record: &ModelRecord, links: &Links) -> Value {
        Value::Object(stub_map(record, links))
    }

    fn full(&self, record: &ModelRecord, links: &Links) -> Value {
        let mut map = stub_map(record, links);
        match self.fields {
            Some(fields) => {
                for field in fields {
                    if let Some(value) = record.fields.get(*field) {
                        map.insert((*field).to_owned(), value.clone());
                    }
                }
            }
            None => {
                for (field, value) in &record.fields {
                    map.entry(field.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        if let Some(parent) = &record.parent {
            map.insert("parent".to_owned(), reference(parent.kind, &parent.id));
        }
        Value::Object(map)
    }
}

fn stub_map(record: &ModelRecord, links: &Links) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("id".to_owned(), Value::from(record.id.as_str()));
    map.insert("kind".to_owned(), Value::from(record.kind.as_str()));
    map.insert("name".to_owned(), Value::from(record.name.as_str()));
    map.insert(
        "selfLink".to_owned(),
        Value::from(links.link(record.kind, &record.id)),
    );
    map
}

fn reference(kind: Kind, id: &RecordId) -> Value {
    let mut map = Map::new();
    map.insert("kind".to_owned(), Value::from(kind.as_str()));
    map.insert("id".to_owned(), Value::from(id.as_str()));
    Value::Object(map)
}

/// The record as stored, for kinds with no registered shaper.
pub fn unshaped(record: &ModelRecord) -> Value {
    let mut map = Map::new();
    map.insert("kind".to_owned(), Value::from(record.kind.as_str()));
    map.insert("id".to_owned(), Value::from(record.id.as_str()));
    map.insert("name".to_owned(), Value::from(record.name.as_str()));
    if let Some(parent) = &record.parent {
        map.insert("parent".to_owned(), reference(parent.kind, &parent.id));
    }
    map.insert(
        "fields".to_owned(),
        Value::Object(record.fields.clone().into_iter().collect()),
    );
    Value::Object(map)
}

/// Slash-separated names from the outermost container down to `record`,
/// following `parent` references through the store, e.g.
/// `/east/apps/nfs-01`.
///
/// A dangling parent reference ends the walk. At most `max_depth` parents
/// are followed.
///
/// # Errors
///
/// Returns a [`DbError`] if a parent lookup fails for any reason other
/// than the parent being absent.
pub fn resolve_path(
    store: &dyn Store,
    record: &ModelRecord,
    max_depth: usize,
) -> Result<String, DbError> {
    let mut names = vec![record.name.clone()];
    let mut next = record.parent.clone();
    while let Some(parent) = next.take() {
        if names.len() > max_depth {
            break;
        }
        match store.get(parent.kind, &parent.id) {
            Ok(found) => {
                next = found.parent;
                names.push(found.name);
            }
            Err(e) if e.is_not_found() => break,
            Err(e) => return Err(e),
        }
    }
    names.reverse();
    Ok(format!("/{}", names.join("/")))
}

/// Whether `path` and the slash-separated `name` share both their root
/// (outermost) and leaf segments, e.g. `/east/storage/nfs-01` matches
/// `east/nfs-01`. Either side with fewer than two segments never matches.
pub fn path_match_root(path: &str, name: &str) -> bool {
    let path: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let name: Vec<&str> = name.trim_start_matches('/').split('/').collect();
    if path.len() < 2 || name.len() < 2 {
        return false;
    }
    path.first() == name.first() && path.last() == name.last()
}

const HOST_FIELDS: &[&str] = &[
    "cluster",
    "productName",
    "productVersion",
    "inMaintenance",
    "cpuSockets",
    "cpuCores",
    "networkAttachments",
    "nics",
];

const DATASTORE_FIELDS: &[&str] = &["type", "capacity", "free", "maintenance"];

/// Kind -> shaper lookup.
#[derive(Clone, Default)]
pub struct ShaperRegistry {
    shapers: BTreeMap<Kind, Arc<dyn Shaper>>,
}

impl std::fmt::Debug for ShaperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaperRegistry")
            .field("kinds", &self.shapers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ShaperRegistry {
    /// An empty registry; every kind passes through unshaped.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by the service: every kind shaped, hosts and
    /// datastores projected to their published fields.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for kind in Kind::ALL {
            registry.register(kind, ResourceShaper::all_fields());
        }
        registry.register(Kind::Host, ResourceShaper::with_fields(HOST_FIELDS));
        registry.register(Kind::Datastore, ResourceShaper::with_fields(DATASTORE_FIELDS));
        registry
    }

    /// Register (or replace) the shaper for `kind`.
    pub fn register(&mut self, kind: Kind, shaper: impl Shaper + 'static) {
        self.shapers.insert(kind, Arc::new(shaper));
    }

    /// Shape `record` as a stub or as full content. Kinds without a
    /// shaper pass through unshaped regardless of `full`.
    pub fn shape(&self, record: &ModelRecord, full: bool, links: &Links) -> Value {
        match self.shapers.get(&record.kind) {
            Some(shaper) if full => shaper.full(record, links),
            Some(shaper) => shaper.stub(record, links),
            None => unshaped(record),
        }
    }
}

/// Per-kind choice between full content and a reference stub.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPolicy {
    full: BTreeMap<Kind, bool>,
}

impl DetailPolicy {
    /// Every kind rendered as a stub.
    pub fn stubs() -> Self {
        Self::default()
    }

    /// Every kind rendered in full.
    pub fn full() -> Self {
        Kind::ALL.into_iter().fold(Self::stubs(), Self::elevate)
    }

    /// Render `kind` in full.
    #[must_use]
    pub fn elevate(mut self, kind: Kind) -> Self {
        self.full.insert(kind, true);
        self
    }

    /// Whether `kind` is rendered in full.
    pub fn is_full(&self, kind: Kind) -> bool {
        self.full.get(&kind).copied().unwrap_or(false)
    }
}
