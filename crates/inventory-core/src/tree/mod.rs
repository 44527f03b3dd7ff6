//! Tree materialization.
//!
//! The store is flat and relational; trees are derived on demand. A
//! [`Navigator`] answers "what are the children of this record" from the
//! [`Relation`]s it declares, a [`NodeBuilder`] turns each record into a
//! [`TreeNode`], and the [`TreeBuilder`] drives both depth-first into an
//! arena-backed [`Forest`].
//!
//! ```text
//!   roots ──► TreeBuilder ──► Navigator.next(parent) ──► Store.list
//!                 │
//!                 └────────► NodeBuilder.node(parent, record) ──► Forest
//! ```
//!
//! A build is all-or-nothing: a store failure or a depth overrun anywhere
//! in the recursion discards everything built so far.

pub mod builder;
pub mod forest;
pub mod navigator;
pub mod node;
pub mod view;

use inventory_db::DbError;
use inventory_types::{Kind, RecordId};

pub use builder::TreeBuilder;
pub use forest::{Forest, NodeId, TreeNode};
pub use navigator::{Link, Navigator, Relation, RelationNavigator, RelationRegistry};
pub use node::{NodeBuilder, ShapingNodeBuilder};
pub use view::TreeView;

/// Errors that abort a tree build.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The store failed while listing children.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: DbError,
    },

    /// Expansion went deeper than the configured limit, which means the
    /// relations form a cycle or the data is malformed.
    #[error("tree depth exceeded {max_depth} below {kind} {id}")]
    DepthExceeded {
        /// The configured limit.
        max_depth: usize,
        /// Kind of the record whose children would exceed the limit.
        kind: Kind,
        /// ID of that record.
        id: RecordId,
    },
}
