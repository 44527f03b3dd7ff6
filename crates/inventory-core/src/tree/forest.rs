//! Arena-backed forest.
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`] index.
//! The parent link is a plain index, so walking up to the root needs no
//! shared ownership. A forest is built once, read, serialized and dropped.

use inventory_types::{Kind, RecordId};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

/// Index of a node within its [`Forest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One node of a materialized tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Kind of the record.
    pub kind: Kind,
    /// ID of the record.
    pub id: RecordId,
    /// Display name of the record, used for paths.
    pub name: String,
    /// Shaped payload.
    pub object: Value,
    /// Containing node; `None` for roots.
    pub parent: Option<NodeId>,
    /// Children in navigator order.
    pub children: Vec<NodeId>,
}

/// A set of trees sharing one arena.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl Forest {
    /// An empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A node with a parent is appended to that parent's
    /// children; a node without one becomes a root. A parent index that
    /// does not belong to this forest is dropped and the node becomes a
    /// root.
    pub fn insert(&mut self, mut node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.children.clear();
        match node.parent.and_then(|p| self.nodes.get_mut(p.0)) {
            Some(parent) => parent.children.push(id),
            None => {
                node.parent = None;
                self.roots.push(id);
            }
        }
        self.nodes.push(node);
        id
    }

    /// Look up a node.
    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    /// Root nodes in build order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of nodes across all trees.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the forest has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node in insertion (depth-first) order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    /// Find the node for a record.
    pub fn find(&self, kind: Kind, id: &RecordId) -> Option<NodeId> {
        self.iter()
            .find(|(_, node)| node.kind == kind && &node.id == id)
            .map(|(id, _)| id)
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.get(id).and_then(|n| n.parent), |p| {
            self.get(*p).and_then(|n| n.parent)
        })
    }

    /// Slash-separated names from the root down to `id`, e.g.
    /// `/dc1/cluster-a/esx-01`.
    pub fn path(&self, id: NodeId) -> Option<String> {
        let node = self.get(id)?;
        let mut names: Vec<&str> = self
            .ancestors(id)
            .filter_map(|p| self.get(p).map(|n| n.name.as_str()))
            .collect();
        names.reverse();
        names.push(node.name.as_str());
        Some(format!("/{}", names.join("/")))
    }
}

/// Serializes a subtree as `{kind, object, children}`.
struct NodeView<'a> {
    forest: &'a Forest,
    id: NodeId,
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(node) = self.forest.get(self.id) else {
            return serializer.serialize_none();
        };
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("kind", &node.kind)?;
        map.serialize_entry("object", &node.object)?;
        map.serialize_entry(
            "children",
            &Children {
                forest: self.forest,
                ids: &node.children,
            },
        )?;
        map.end()
    }
}

struct Children<'a> {
    forest: &'a Forest,
    ids: &'a [NodeId],
}

impl Serialize for Children<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.ids.len()))?;
        for id in self.ids {
            seq.serialize_element(&NodeView {
                forest: self.forest,
                id: *id,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Forest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Children {
            forest: self,
            ids: &self.roots,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn node(kind: Kind, id: &str, parent: Option<NodeId>) -> TreeNode {
        TreeNode {
            kind,
            id: RecordId::from(id),
            name: id.to_owned(),
            object: json!({ "id": id }),
            parent,
            children: Vec::new(),
        }
    }

    #[test]
    fn insert_links_children_to_parents() {
        let mut forest = Forest::new();
        let dc = forest.insert(node(Kind::DataCenter, "dc1", None));
        let c = forest.insert(node(Kind::Cluster, "c1", Some(dc)));
        let h = forest.insert(node(Kind::Host, "h1", Some(c)));

        assert_eq!(forest.roots(), &[dc]);
        assert_eq!(forest.get(dc).unwrap().children, vec![c]);
        assert_eq!(forest.get(h).unwrap().parent, Some(c));
        assert_eq!(forest.ancestors(h).collect::<Vec<_>>(), vec![c, dc]);
        assert_eq!(forest.len(), 3);
    }

    #[test]
    fn foreign_parent_becomes_root() {
        let mut forest = Forest::new();
        let h = forest.insert(node(Kind::Host, "h1", Some(NodeId(5))));
        assert_eq!(forest.roots(), &[h]);
        assert_eq!(forest.get(h).unwrap().parent, None);
    }

    #[test]
    fn path_walks_back_references() {
        let mut forest = Forest::new();
        let dc = forest.insert(node(Kind::DataCenter, "dc1", None));
        let c = forest.insert(node(Kind::Cluster, "c1", Some(dc)));
        let h = forest.insert(node(Kind::Host, "h1", Some(c)));

        assert_eq!(forest.path(h).as_deref(), Some("/dc1/c1/h1"));
        assert_eq!(forest.path(dc).as_deref(), Some("/dc1"));
        assert_eq!(forest.find(Kind::Host, &RecordId::from("h1")), Some(h));
    }

    #[test]
    fn serializes_as_nested_kind_object_children() {
        let mut forest = Forest::new();
        let dc = forest.insert(node(Kind::DataCenter, "dc1", None));
        forest.insert(node(Kind::Cluster, "c1", Some(dc)));

        assert_eq!(
            serde_json::to_value(&forest).unwrap(),
            json!([{
                "kind": "DataCenter",
                "object": {"id": "dc1"},
                "children": [{
                    "kind": "Cluster",
                    "object": {"id": "c1"},
                    "children": [],
                }],
            }])
        );
    }
}
