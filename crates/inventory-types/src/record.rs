//! Inventory records and references between them.
//!
//! A [`ModelRecord`] is the flat, relational form of an entity as the store
//! holds it: identity, a display name, an optional containing parent (used
//! by the folder hierarchy), and the kind-specific fields. Records reference
//! each other by ID through ordinary fields (`cluster`, `dataCenter`) or
//! through [`ModelRecord::parent`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::RecordId;
use crate::kinds::Kind;

/// A typed reference to another record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Ref {
    /// Kind of the referenced record.
    pub kind: Kind,
    /// ID of the referenced record.
    pub id: RecordId,
}

impl Ref {
    /// Build a reference.
    pub fn new(kind: Kind, id: impl Into<RecordId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// A single inventory entity identified by `(kind, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ModelRecord {
    /// Entity type.
    pub kind: Kind,
    /// Provider-assigned ID, unique within the kind.
    pub id: RecordId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Containing record in the folder hierarchy, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Ref>,
    /// Kind-specific fields, keyed by field name.
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ModelRecord {
    /// Create a record with no parent and no fields.
    pub fn new(kind: Kind, id: impl Into<RecordId>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
            parent: None,
            fields: BTreeMap::new(),
        }
    }

    /// Set a kind-specific field.
    #[must_use]
    pub fn with_field(
        mut self,
        field: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Set the containing parent.
    #[must_use]
    pub fn with_parent(mut self, parent: Ref) -> Self {
        self.parent = Some(parent);
        self
    }

    /// The `(kind, id)` reference to this record.
    pub fn reference(&self) -> Ref {
        Ref {
            kind: self.kind,
            id: self.id.clone(),
        }
    }

    /// Resolve a field by name for filtering and relation queries.
    ///
    /// `id`, `name` and `parent` resolve to the identity columns (the
    /// parent resolves to its ID); everything else is looked up in
    /// [`ModelRecord::fields`].
    pub fn field(&self, field: &str) -> Option<serde_json::Value> {
        match field {
            "id" => Some(serde_json::Value::from(self.id.as_str())),
            "name" => Some(serde_json::Value::from(self.name.as_str())),
            "parent" => self
                .parent
                .as_ref()
                .map(|p| serde_json::Value::from(p.id.as_str())),
            other => self.fields.get(other).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_columns_resolve_as_fields() {
        let record = ModelRecord::new(Kind::Folder, "f2", "apps")
            .with_parent(Ref::new(Kind::Folder, "f1"))
            .with_field("datacenter", "dc1");

        assert_eq!(record.field("id"), Some(serde_json::json!("f2")));
        assert_eq!(record.field("name"), Some(serde_json::json!("apps")));
        assert_eq!(record.field("parent"), Some(serde_json::json!("f1")));
        assert_eq!(record.field("datacenter"), Some(serde_json::json!("dc1")));
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn record_deserializes_with_defaults() {
        let record: Result<ModelRecord, _> =
            serde_json::from_str(r#"{"kind":"Host","id":"h1"}"#);
        let record = record.ok();
        assert!(record.is_some());
        if let Some(record) = record {
            assert_eq!(record.kind, Kind::Host);
            assert!(record.name.is_empty());
            assert!(record.parent.is_none());
            assert!(record.fields.is_empty());
        }
    }
}
