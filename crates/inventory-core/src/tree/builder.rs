//! Depth-first tree construction.

use inventory_types::ModelRecord;
use tracing::debug;

use crate::tree::TreeError;
use crate::tree::forest::{Forest, NodeId};
use crate::tree::navigator::Navigator;
use crate::tree::node::NodeBuilder;

/// Expands roots into a [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBuilder {
    max_depth: usize,
}

impl TreeBuilder {
    /// A builder that refuses to expand nodes deeper than `max_depth`
    /// below a root.
    pub const fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Build one tree per root, children in navigator order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Store`] if the navigator fails at any depth and
    /// [`TreeError::DepthExceeded`] if a node at `max_depth` still has
    /// children. No partial forest is returned.
    pub fn build(
        &self,
        roots: &[ModelRecord],
        navigator: &dyn Navigator,
        builder: &dyn NodeBuilder,
    ) -> Result<Forest, TreeError> {
        let mut forest = Forest::new();
        for root in roots {
            let id = Self::place(&mut forest, builder, None, root);
            self.expand(&mut forest, navigator, builder, id, root, 0)?;
        }
        debug!(roots = roots.len(), nodes = forest.len(), "tree built");
        Ok(forest)
    }

    fn expand(
        &self,
        forest: &mut Forest,
        navigator: &dyn Navigator,
        builder: &dyn NodeBuilder,
        id: NodeId,
        record: &ModelRecord,
        depth: usize,
    ) -> Result<(), TreeError> {
        let children = navigator.next(record)?;
        if children.is_empty() {
            return Ok(());
        }
        if depth >= self.max_depth {
            return Err(TreeError::DepthExceeded {
                max_depth: self.max_depth,
                kind: record.kind,
                id: record.id.clone(),
            });
        }
        for child in &children {
            let child_id = Self::place(forest, builder, Some(id), child);
            self.expand(forest, navigator, builder, child_id, child, depth.saturating_add(1))?;
        }
        Ok(())
    }

    fn place(
        forest: &mut Forest,
        builder: &dyn NodeBuilder,
        parent: Option<NodeId>,
        record: &ModelRecord,
    ) -> NodeId {
        forest.insert(builder.node(parent, record))
    }
}
