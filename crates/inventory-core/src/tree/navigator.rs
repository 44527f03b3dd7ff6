//! Child navigation over declared relations.
//!
//! A [`Relation`] is a named one-to-many edge from a parent kind to a
//! child kind, realized by a foreign-key field on the child or by the
//! child's typed `parent` reference. A
//! [`RelationRegistry`] maps each parent kind to its relations, in the
//! order children are listed. Kinds with no relations are leaves.

use std::collections::BTreeMap;

use inventory_db::{DbError, Store};
use inventory_types::{Filter, Kind, ModelRecord, Ref};
use tracing::trace;

/// Lists the children of a record.
pub trait Navigator {
    /// The children of `parent`, in relation-declaration order. A kind with
    /// no declared relation yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns a [`DbError`] if a store read fails.
    fn next(&self, parent: &ModelRecord) -> Result<Vec<ModelRecord>, DbError>;
}

/// A directed parent -> children edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Name of the edge, for diagnostics.
    pub name: &'static str,
    /// Kind of the children.
    pub child: Kind,
    /// How a child points back at its parent.
    pub link: Link,
}

/// The back-pointer a child carries to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// A field holding the parent's ID. The parent kind is implied.
    Field(&'static str),
    /// The `parent` reference, matched on both kind and ID.
    Parent,
}

impl Relation {
    /// Declare an edge keyed by a foreign-key field.
    pub const fn new(name: &'static str, child: Kind, foreign_key: &'static str) -> Self {
        Self {
            name,
            child,
            link: Link::Field(foreign_key),
        }
    }

    /// Declare an edge keyed by the child's `parent` reference.
    pub const fn contained(name: &'static str, child: Kind) -> Self {
        Self {
            name,
            child,
            link: Link::Parent,
        }
    }
}

/// Parent kind -> relations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationRegistry {
    relations: BTreeMap<Kind, Vec<Relation>>,
}

impl RelationRegistry {
    /// A registry with no relations; every kind is a leaf.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a relation from `parent`.
    #[must_use]
    pub fn declare(mut self, parent: Kind, relation: Relation) -> Self {
        self.relations.entry(parent).or_default().push(relation);
        self
    }

    /// Relations declared from `parent`.
    pub fn relations(&self, parent: Kind) -> &[Relation] {
        self.relations.get(&parent).map(Vec::as_slice).unwrap_or_default()
    }

    /// DataCenter -> Cluster -> (Host, VM).
    pub fn cluster() -> Self {
        Self::new()
            .declare(
                Kind::DataCenter,
                Relation::new("clusters", Kind::Cluster, "dataCenter"),
            )
            .declare(Kind::Cluster, Relation::new("hosts", Kind::Host, "cluster"))
            .declare(Kind::Cluster, Relation::new("vms", Kind::Vm, "cluster"))
    }

    /// Folder containment through the `parent` reference.
    pub fn folder() -> Self {
        [
            ("folders", Kind::Folder),
            ("datacenters", Kind::DataCenter),
            ("clusters", Kind::Cluster),
            ("hosts", Kind::Host),
            ("vms", Kind::Vm),
            ("datastores", Kind::Datastore),
            ("networks", Kind::Network),
        ]
        .into_iter()
        .fold(Self::new(), |registry, (name, child)| {
            registry.declare(Kind::Folder, Relation::contained(name, child))
        })
    }
}

/// A [`Navigator`] answering from a [`Store`] through a [`RelationRegistry`].
pub struct RelationNavigator<'a> {
    store: &'a dyn Store,
    registry: &'a RelationRegistry,
}

impl<'a> RelationNavigator<'a> {
    /// Navigate `store` along `registry`.
    pub fn new(store: &'a dyn Store, registry: &'a RelationRegistry) -> Self {
        Self { store, registry }
    }
}

impl RelationNavigator<'_> {
    fn expand(
        &self,
        parent: &ModelRecord,
        relation: Relation,
    ) -> Result<Vec<ModelRecord>, DbError> {
        match relation.link {
            Link::Field(field) => {
                let filter = Filter::eq(field, parent.id.as_str());
                self.store.list(relation.child, &filter)
            }
            Link::Parent => {
                // The store filter narrows by ID only.
                let filter = Filter::eq("parent", parent.id.as_str());
                let owner: Ref = parent.reference();
                let mut found = self.store.list(relation.child, &filter)?;
                found.retain(|child| child.parent.as_ref() == Some(&owner));
                Ok(found)
            }
        }
    }
}

impl Navigator for RelationNavigator<'_> {
    fn next(&self, parent: &ModelRecord) -> Result<Vec<ModelRecord>, DbError> {
        let mut children = Vec::new();
        for &relation in self.registry.relations(parent.kind) {
            let found = self.expand(parent, relation)?;
            trace!(
                parent = %parent.id,
                relation = relation.name,
                count = found.len(),
                "relation expanded"
            );
            children.extend(found);
        }
        Ok(children)
    }
}
