//! Arena-backed document tree
//!
//! Structural primitives used by the anchor codec, the highlight applier and
//! the removal controller: traversal in document order, text slicing,
//! decoration wrap/unwrap and text normalization.

use super::types::{DecorationTag, Node, NodeId, NodeKind};
use super::{byte_index, char_len, TreeError};

/// The content tree of one rendered section
///
/// Detached nodes keep their arena slot so ids are never reused. Every wrap
/// and unwrap therefore grows the arena; the growth lasts only as long as the
/// section, since each mount builds a new tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl DocumentTree {
    /// Create a tree with a single root element
    pub fn new(root_tag: &str) -> Self {
        Self::with_root_attrs(root_tag, Vec::new())
    }

    /// Create a tree whose root element carries attributes
    pub fn with_root_attrs(root_tag: &str, attrs: Vec<(String, String)>) -> Self {
        Self {
            nodes: vec![Node::new(
                NodeKind::Element {
                    tag: root_tag.to_string(),
                    attrs,
                },
                None,
            )],
            root: NodeId(0),
        }
    }

    /// The content root
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of arena slots, including detached nodes
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(id.0).ok_or(TreeError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(id.0).ok_or(TreeError::NodeNotFound(id))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Text of a text leaf
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(Node::text)
    }

    /// Length of a text leaf in characters
    pub fn text_len(&self, id: NodeId) -> Result<usize, TreeError> {
        self.text(id).map(char_len).ok_or(TreeError::NotText(id))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_text)
    }

    pub fn is_decoration(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::is_decoration)
    }

    /// Tag of a decoration node
    pub fn decoration_tag(&self, id: NodeId) -> Option<&DecorationTag> {
        self.get(id).and_then(Node::decoration)
    }

    // ========================================================================
    // Building
    // ========================================================================

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind, parent));
        id
    }

    fn ensure_container(&self, id: NodeId) -> Result<(), TreeError> {
        match self.node(id)?.kind {
            NodeKind::Text(_) => Err(TreeError::NotContainer(id)),
            _ => Ok(()),
        }
    }

    /// Append an element as the last child of `parent`
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId, TreeError> {
        self.append_element_with_attrs(parent, tag, Vec::new())
    }

    /// Append an element with attributes as the last child of `parent`
    pub fn append_element_with_attrs(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: Vec<(String, String)>,
    ) -> Result<NodeId, TreeError> {
        self.ensure_container(parent)?;
        let id = self.alloc(
            NodeKind::Element {
                tag: tag.to_string(),
                attrs,
            },
            Some(parent),
        );
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Append a text leaf as the last child of `parent`
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, TreeError> {
        self.ensure_container(parent)?;
        let id = self.alloc(NodeKind::Text(text.to_string()), Some(parent));
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Whether `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether `node` is still reachable from the root
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.get(node).is_some() && self.contains(self.root, node)
    }

    /// Position of `id` among its parent's children
    pub fn index_in_parent(&self, id: NodeId) -> Result<usize, TreeError> {
        let parent = self.node(id)?.parent.ok_or(TreeError::Detached(id))?;
        self.children(parent)
            .iter()
            .position(|&c| c == id)
            .ok_or(TreeError::Detached(id))
    }

    /// All nodes under `under` (inclusive) in document order
    pub fn descendants(&self, under: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![under];
        while let Some(id) = stack.pop() {
            if self.get(id).is_none() {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Text leaves under `under` in document order, including those that sit
    /// inside decorations
    pub fn text_leaves(&self, under: NodeId) -> Vec<NodeId> {
        self.descendants(under)
            .into_iter()
            .filter(|&id| self.is_text(id))
            .collect()
    }

    /// Decoration nodes under `under` in document order
    pub fn decorations(&self, under: NodeId) -> Vec<NodeId> {
        self.descendants(under)
            .into_iter()
            .filter(|&id| self.is_decoration(id))
            .collect()
    }

    /// Nearest decoration that is `id` or one of its ancestors
    pub fn enclosing_decoration(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_decoration(node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Concatenated text of every leaf under `under`
    pub fn text_content(&self, under: NodeId) -> String {
        self.text_leaves(under)
            .into_iter()
            .filter_map(|id| self.text(id))
            .collect()
    }

    // ========================================================================
    // Mutation (decorations)
    // ========================================================================

    /// Split a text leaf into `before`, `middle` and `after` and wrap `middle`
    /// in a decoration, in place of the original leaf
    ///
    /// Offsets are in characters. Empty `before`/`after` pieces are not
    /// inserted. The original leaf is detached. Returns the decoration id.
    pub(crate) fn wrap_text_slice(
        &mut self,
        leaf: NodeId,
        start: usize,
        end: usize,
        tag: DecorationTag,
    ) -> Result<NodeId, TreeError> {
        let text = self.text(leaf).ok_or(TreeError::NotText(leaf))?.to_string();
        let len = char_len(&text);
        if start >= end || end > len {
            return Err(TreeError::OffsetOutOfBounds {
                node: leaf,
                start,
                end,
                len,
            });
        }
        let parent = self.node(leaf)?.parent.ok_or(TreeError::Detached(leaf))?;
        let index = self.index_in_parent(leaf)?;

        let out_of_bounds = || TreeError::OffsetOutOfBounds {
            node: leaf,
            start,
            end,
            len,
        };
        let split_start = byte_index(&text, start).ok_or_else(out_of_bounds)?;
        let split_end = byte_index(&text, end).ok_or_else(out_of_bounds)?;
        let (before, rest) = text.split_at(split_start);
        let (middle, after) = rest.split_at(split_end - split_start);

        let mut replacement = Vec::with_capacity(3);
        if !before.is_empty() {
            replacement.push(self.alloc(NodeKind::Text(before.to_string()), Some(parent)));
        }
        let decoration = self.alloc(NodeKind::Decoration(tag), Some(parent));
        let inner = self.alloc(NodeKind::Text(middle.to_string()), Some(decoration));
        self.node_mut(decoration)?.children.push(inner);
        replacement.push(decoration);
        if !after.is_empty() {
            replacement.push(self.alloc(NodeKind::Text(after.to_string()), Some(parent)));
        }

        self.node_mut(parent)?
            .children
            .splice(index..=index, replacement);
        self.node_mut(leaf)?.parent = None;
        Ok(decoration)
    }

    /// Move a decoration's children back into its parent, drop the wrapper and
    /// merge the parent's adjacent text children. Returns the parent.
    pub(crate) fn unwrap_decoration(&mut self, decoration: NodeId) -> Result<NodeId, TreeError> {
        if !self.node(decoration)?.is_decoration() {
            return Err(TreeError::NotDecoration(decoration));
        }
        let parent = self
            .node(decoration)?
            .parent
            .ok_or(TreeError::Detached(decoration))?;
        let index = self.index_in_parent(decoration)?;

        let children = std::mem::take(&mut self.node_mut(decoration)?.children);
        for &child in &children {
            self.node_mut(child)?.parent = Some(parent);
        }
        self.node_mut(parent)?
            .children
            .splice(index..=index, children);
        self.node_mut(decoration)?.parent = None;

        self.normalize(parent)?;
        Ok(parent)
    }

    /// Merge runs of adjacent text children of `parent` into single leaves
    ///
    /// The first leaf of each run keeps its id and absorbs the text of the
    /// following leaves, which are detached.
    pub fn normalize(&mut self, parent: NodeId) -> Result<(), TreeError> {
        let children = std::mem::take(&mut self.node_mut(parent)?.children);
        let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());

        for child in children {
            let previous_text = merged.last().filter(|&&prev| self.is_text(prev)).copied();
            match (previous_text, self.text(child).map(str::to_string)) {
                (Some(previous), Some(text)) => {
                    if let NodeKind::Text(existing) = &mut self.node_mut(previous)?.kind {
                        existing.push_str(&text);
                    }
                    self.node_mut(child)?.parent = None;
                }
                _ => merged.push(child),
            }
        }

        self.node_mut(parent)?.children = merged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlights::HighlightColor;

    fn paragraph(text: &str) -> (DocumentTree, NodeId, NodeId) {
        let mut tree = DocumentTree::new("section");
        let p = tree.append_element(tree.root(), "p").unwrap();
        let t = tree.append_text(p, text).unwrap();
        (tree, p, t)
    }

    fn tag(id: &str) -> DecorationTag {
        DecorationTag::new(id, HighlightColor::Yellow)
    }

    #[test]
    fn test_append_text_to_text_fails() {
        let (mut tree, _, t) = paragraph("hello");
        assert_eq!(tree.append_text(t, "x"), Err(TreeError::NotContainer(t)));
    }

    #[test]
    fn test_wrap_middle_slice() {
        let (mut tree, p, t) = paragraph("the mitochondria is");
        let deco = tree.wrap_text_slice(t, 4, 16, tag("h1")).unwrap();

        let children = tree.children(p).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(tree.text(children[0]), Some("the "));
        assert_eq!(children[1], deco);
        assert_eq!(tree.text_content(deco), "mitochondria");
        assert_eq!(tree.text(children[2]), Some(" is"));
        assert!(!tree.is_attached(t));
    }

    #[test]
    fn test_wrap_whole_leaf_omits_empty_pieces() {
        let (mut tree, p, t) = paragraph("glucose");
        let deco = tree.wrap_text_slice(t, 0, 7, tag("h1")).unwrap();
        assert_eq!(tree.children(p), &[deco]);
    }

    #[test]
    fn test_wrap_rejects_bad_offsets() {
        let (mut tree, _, t) = paragraph("abc");
        assert!(matches!(
            tree.wrap_text_slice(t, 2, 2, tag("h1")),
            Err(TreeError::OffsetOutOfBounds { .. })
        ));
        assert!(matches!(
            tree.wrap_text_slice(t, 1, 9, tag("h1")),
            Err(TreeError::OffsetOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_wrap_multibyte_text() {
        let (mut tree, p, t) = paragraph("naïve café");
        let deco = tree.wrap_text_slice(t, 6, 10, tag("h1")).unwrap();
        assert_eq!(tree.text_content(deco), "café");
        assert_eq!(tree.text_content(p), "naïve café");
    }

    #[test]
    fn test_unwrap_restores_single_leaf() {
        let (mut tree, p, t) = paragraph("the mitochondria is");
        let deco = tree.wrap_text_slice(t, 4, 16, tag("h1")).unwrap();
        let parent = tree.unwrap_decoration(deco).unwrap();

        assert_eq!(parent, p);
        assert_eq!(tree.children(p).len(), 1);
        assert_eq!(tree.text(tree.children(p)[0]), Some("the mitochondria is"));
        assert!(tree.decorations(tree.root()).is_empty());
    }

    #[test]
    fn test_unwrap_non_decoration_fails() {
        let (mut tree, p, _) = paragraph("abc");
        assert_eq!(tree.unwrap_decoration(p), Err(TreeError::NotDecoration(p)));
    }

    #[test]
    fn test_normalize_keeps_elements_apart() {
        let mut tree = DocumentTree::new("section");
        let p = tree.append_element(tree.root(), "p").unwrap();
        tree.append_text(p, "a").unwrap();
        tree.append_text(p, "b").unwrap();
        tree.append_element(p, "br").unwrap();
        tree.append_text(p, "c").unwrap();

        tree.normalize(p).unwrap();
        let children = tree.children(p).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(tree.text(children[0]), Some("ab"));
        assert_eq!(tree.text(children[2]), Some("c"));
    }

    #[test]
    fn test_document_order_traversal() {
        let mut tree = DocumentTree::new("section");
        let p1 = tree.append_element(tree.root(), "p").unwrap();
        let a = tree.append_text(p1, "one").unwrap();
        let em = tree.append_element(p1, "em").unwrap();
        let b = tree.append_text(em, "two").unwrap();
        let p2 = tree.append_element(tree.root(), "p").unwrap();
        let c = tree.append_text(p2, "three").unwrap();

        assert_eq!(tree.text_leaves(tree.root()), vec![a, b, c]);
        assert_eq!(tree.text_content(tree.root()), "onetwothree");
        assert!(tree.contains(p1, b));
        assert!(!tree.contains(p2, b));
    }
}
