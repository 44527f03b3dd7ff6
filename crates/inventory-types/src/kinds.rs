//! Enumeration types for the inventory model.
//!
//! [`Kind`] tags every record with its entity type and maps it to the REST
//! collection that serves it. [`WatchEventType`] classifies a delta
//! delivered on a watch stream.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The entity type of an inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Kind {
    /// A datacenter, the usual root of the compute hierarchy.
    DataCenter,
    /// A cluster of hosts inside a datacenter.
    Cluster,
    /// A hypervisor host.
    Host,
    /// A virtual machine.
    #[serde(rename = "VM")]
    Vm,
    /// A logical network.
    Network,
    /// A storage domain (block or file storage pool).
    StorageDomain,
    /// A datastore.
    Datastore,
    /// An inventory folder.
    Folder,
}

impl Kind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::DataCenter,
        Self::Cluster,
        Self::Host,
        Self::Vm,
        Self::Network,
        Self::StorageDomain,
        Self::Datastore,
        Self::Folder,
    ];

    /// The wire name of the kind (matches its serialized form).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataCenter => "DataCenter",
            Self::Cluster => "Cluster",
            Self::Host => "Host",
            Self::Vm => "VM",
            Self::Network => "Network",
            Self::StorageDomain => "StorageDomain",
            Self::Datastore => "Datastore",
            Self::Folder => "Folder",
        }
    }

    /// The REST collection segment serving this kind.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::DataCenter => "datacenters",
            Self::Cluster => "clusters",
            Self::Host => "hosts",
            Self::Vm => "vms",
            Self::Network => "networks",
            Self::StorageDomain => "storagedomains",
            Self::Datastore => "datastores",
            Self::Folder => "folders",
        }
    }

    /// Resolve a REST collection segment back to its kind.
    pub fn from_collection(collection: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.collection() == collection)
    }
}

impl core::fmt::Display for Kind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Watch event types
// ---------------------------------------------------------------------------

/// The type of a delta delivered on a watch stream.
///
/// Types are relative to the subscriber's filter: a record that starts
/// matching is `Created`, one that stops matching is `Deleted`, even when
/// the underlying store mutation was an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum WatchEventType {
    /// The record entered the watched set.
    Created,
    /// The record changed and is still in the watched set.
    Updated,
    /// The record left the watched set.
    Deleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collections_round_trip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_collection(kind.collection()), Some(kind));
        }
        assert_eq!(Kind::from_collection("tree"), None);
    }

    #[test]
    fn vm_uses_upper_case_wire_name() {
        let json = serde_json::to_string(&Kind::Vm).ok();
        assert_eq!(json.as_deref(), Some("\"VM\""));
        assert_eq!(Kind::Vm.to_string(), "VM");
    }

    #[test]
    fn kind_names_match_serde() {
        for kind in Kind::ALL {
            let json = serde_json::to_value(kind).ok();
            assert_eq!(json, Some(serde_json::Value::from(kind.as_str())));
        }
    }
}
