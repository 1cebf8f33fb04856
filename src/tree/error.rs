//! Tree error types

use thiserror::Error;

use super::NodeId;

/// Structural errors raised by tree operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// Id does not belong to this tree
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Operation needs a text leaf
    #[error("Node {0} is not a text leaf")]
    NotText(NodeId),

    /// Operation needs a decoration
    #[error("Node {0} is not a decoration")]
    NotDecoration(NodeId),

    /// Operation needs a node that may hold children
    #[error("Node {0} cannot have children")]
    NotContainer(NodeId),

    /// Node has no parent (it was split, unwrapped, or is the root)
    #[error("Node {0} is detached")]
    Detached(NodeId),

    /// Slice bounds outside the text leaf
    #[error("Offsets {start}..{end} out of bounds for node {node} (length {len})")]
    OffsetOutOfBounds {
        node: NodeId,
        start: usize,
        end: usize,
        len: usize,
    },

    /// Content root must be an element
    #[error("Content root must be an element")]
    InvalidRoot,
}
