//! Anchor types
//!
//! An [`Anchor`] is a structural address (child-index path + character offset)
//! that survives a full re-render of the section. [`Position`] and
//! [`TextRange`] are their live counterparts, expressed in node ids of one
//! particular tree instance.

use serde::{Deserialize, Serialize};

use crate::tree::NodeId;

/// A point in the logical section tree
///
/// Anchors order in document order: paths compare lexicographically, then
/// offsets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Anchor {
    /// Logical child indices from the content root down to a text run
    pub path: Vec<usize>,
    /// Character offset into the run's text
    pub offset: usize,
}

impl Anchor {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        Self { path, offset }
    }
}

/// A directional pair of anchors, start ≤ end in document order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Anchor,
    pub end: Anchor,
}

impl Span {
    /// Build a span, swapping the ends if they are given backwards
    pub fn new(a: Anchor, b: Anchor) -> Self {
        if b < a {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    /// Zero-length span
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Whether the two spans share at least one character
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A live point: a text leaf of the current tree and a character offset in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A live selection range as reported by the host
///
/// `start` and `end` may be given in either order (backward selections).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Same node, same offset
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Which physical leaf a logical offset picks when it falls exactly on the
/// boundary between two adjacent text leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Prefer the later leaf (span starts)
    Forward,
    /// Prefer the earlier leaf (span ends)
    Backward,
}

/// Outcome of decoding an anchor against a live tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Position),
    /// The anchor does not address anything in this tree
    Unresolved,
}

impl Resolution {
    pub fn position(self) -> Option<Position> {
        match self {
            Resolution::Resolved(position) => Some(position),
            Resolution::Unresolved => None,
        }
    }
}
