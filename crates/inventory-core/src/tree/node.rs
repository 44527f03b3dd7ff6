//! Record -> tree node shaping.

use inventory_types::ModelRecord;

use crate::resource::{DetailPolicy, Links, ShaperRegistry};
use crate::tree::forest::{NodeId, TreeNode};

/// Builds a [`TreeNode`] for a record.
pub trait NodeBuilder {
    /// Shape `record` into a node under `parent`. The record is not
    /// modified; the node starts with no children.
    fn node(&self, parent: Option<NodeId>, record: &ModelRecord) -> TreeNode;
}

/// A [`NodeBuilder`] that shapes payloads through a [`ShaperRegistry`]
/// according to a [`DetailPolicy`].
#[derive(Debug)]
pub struct ShapingNodeBuilder<'a> {
    shapers: &'a ShaperRegistry,
    links: &'a Links,
    policy: DetailPolicy,
}

impl<'a> ShapingNodeBuilder<'a> {
    /// Build nodes with `shapers` under `policy`.
    pub fn new(shapers: &'a ShaperRegistry, links: &'a Links, policy: DetailPolicy) -> Self {
        Self {
            shapers,
            links,
            policy,
        }
    }
}

impl NodeBuilder for ShapingNodeBuilder<'_> {
    fn node(&self, parent: Option<NodeId>, record: &ModelRecord) -> TreeNode {
        TreeNode {
            kind: record.kind,
            id: record.id.clone(),
            name: record.name.clone(),
            object: self
                .shapers
                .shape(record, self.policy.is_full(record.kind), self.links),
            parent,
            children: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use inventory_types::Kind;
    use serde_json::json;

    use super::*;

    #[test]
    fn detail_changes_payload_not_shape() {
        let shapers = ShaperRegistry::standard();
        let links = Links::new("p1");
        let vm = ModelRecord::new(Kind::Vm, "vm1", "web").with_field("cpuCores", 2);

        let stub = ShapingNodeBuilder::new(&shapers, &links, DetailPolicy::stubs()).node(None, &vm);
        let elevated = DetailPolicy::stubs().elevate(Kind::Vm);
        let full = ShapingNodeBuilder::new(&shapers, &links, elevated).node(None, &vm);

        assert_eq!(stub.object.get("cpuCores"), None);
        assert_eq!(full.object["cpuCores"], json!(2));
        assert_eq!((stub.kind, &stub.id, &stub.children), (full.kind, &full.id, &full.children));
    }
}
