//! Document tree node types

use std::fmt;

use crate::highlights::HighlightColor;

/// Index of a node inside a [`super::DocumentTree`] arena
///
/// Ids are never reused within one tree. A node that has been split or
/// unwrapped keeps its id but becomes detached from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A semantic element such as `p` or `em`
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    /// A text leaf
    Text(String),
    /// A highlight wrapper around a run of text
    Decoration(DecorationTag),
}

/// Tag carried by a decoration node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationTag {
    /// Id of the highlight this decoration renders
    pub highlight_id: String,
    /// Palette color, used when rendering
    pub color: HighlightColor,
}

impl DecorationTag {
    pub fn new(highlight_id: impl Into<String>, color: HighlightColor) -> Self {
        Self {
            highlight_id: highlight_id.into(),
            color,
        }
    }
}

/// A single arena slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Text of a text leaf
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Tag of a decoration node
    pub fn decoration(&self) -> Option<&DecorationTag> {
        match &self.kind {
            NodeKind::Decoration(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    pub fn is_decoration(&self) -> bool {
        matches!(self.kind, NodeKind::Decoration(_))
    }
}
