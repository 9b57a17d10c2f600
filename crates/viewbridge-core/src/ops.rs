//! Operations emitted by the diff engine, one root at a time.

use crate::style::StyleMap;
use crate::NodeId;

/// One node operation against a root's logical tree. Operations are
/// applied in arrival order per root; nothing is guaranteed across
/// roots.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Create {
        node_id: NodeId,
        parent_id: NodeId,
        index: i32,
        kind: String,
        /// Initial attribute set carried on creation.
        style: StyleMap,
    },
    Update {
        node_id: NodeId,
        delta: StyleMap,
    },
    Delete {
        node_id: NodeId,
    },
    Move {
        node_id: NodeId,
        new_parent_id: NodeId,
        new_index: i32,
    },
}

impl Mutation {
    /// Convenience constructor for a create with no initial style.
    pub fn create(node_id: NodeId, parent_id: NodeId, index: i32, kind: impl Into<String>) -> Self {
        Mutation::Create {
            node_id,
            parent_id,
            index,
            kind: kind.into(),
            style: StyleMap::new(),
        }
    }
}
