//! The tree views served by the API.

use inventory_db::{DbError, Store};
use inventory_types::{Filter, Kind, ModelRecord};

use crate::resource::DetailPolicy;
use crate::tree::navigator::RelationRegistry;

/// A named hierarchy over the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeView {
    /// DataCenter -> Cluster -> Host, VM.
    Cluster,
    /// Folder containment.
    Folder,
}

impl TreeView {
    /// Resolve the `/tree/{view}` path segment.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "cluster" => Some(Self::Cluster),
            "folder" => Some(Self::Folder),
            _ => None,
        }
    }

    /// The relations this view navigates.
    pub fn relations(self) -> RelationRegistry {
        match self {
            Self::Cluster => RelationRegistry::cluster(),
            Self::Folder => RelationRegistry::folder(),
        }
    }

    /// The records the view's trees start from: every datacenter, or every
    /// folder without a containing parent.
    pub fn roots(self, store: &dyn Store) -> Result<Vec<ModelRecord>, DbError> {
        match self {
            Self::Cluster => store.list(Kind::DataCenter, &Filter::all()),
            Self::Folder => Ok(store
                .list(Kind::Folder, &Filter::all())?
                .into_iter()
                .filter(|folder| folder.parent.is_none())
                .collect()),
        }
    }

    /// Which kinds are rendered in full when the caller asks for detail.
    pub fn detail_policy(self, detail: bool) -> DetailPolicy {
        match (self, detail) {
            (_, false) => DetailPolicy::stubs(),
            (Self::Cluster, true) => DetailPolicy::stubs().elevate(Kind::Vm),
            (Self::Folder, true) => DetailPolicy::full(),
        }
    }
}
