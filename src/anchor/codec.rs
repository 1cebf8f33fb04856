//! Anchor codec
//!
//! Encodes live positions into [`Anchor`]s and decodes them back.
//!
//! Paths are computed over the *logical* tree: decoration wrappers are
//! transparent and every maximal run of adjacent text leaves counts as one
//! child. That is the shape the tree takes again once all decorations are
//! unwrapped and normalized, and the shape of a fresh render, so anchors
//! encoded on a decorated tree still resolve after the section is rebuilt.

use crate::tree::{char_len, DocumentTree, NodeId, NodeKind};

use super::types::{Affinity, Anchor, Position, Resolution, Span, TextRange};

/// A child as seen through the logical view
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogicalChild {
    Element(NodeId),
    /// Adjacent physical text leaves, in document order
    Text(Vec<NodeId>),
}

fn logical_children(tree: &DocumentTree, parent: NodeId) -> Vec<LogicalChild> {
    let mut out = Vec::new();
    collect_logical(tree, parent, &mut out);
    out
}

fn collect_logical(tree: &DocumentTree, parent: NodeId, out: &mut Vec<LogicalChild>) {
    for &child in tree.children(parent) {
        let Some(node) = tree.get(child) else {
            continue;
        };
        match node.kind() {
            NodeKind::Decoration(_) => collect_logical(tree, child, out),
            NodeKind::Text(_) => match out.last_mut() {
                Some(LogicalChild::Text(run)) => run.push(child),
                _ => out.push(LogicalChild::Text(vec![child])),
            },
            NodeKind::Element { .. } => out.push(LogicalChild::Element(child)),
        }
    }
}

/// Nearest ancestor that is not a decoration
fn logical_parent(tree: &DocumentTree, node: NodeId) -> Option<NodeId> {
    let mut current = tree.parent(node)?;
    while tree.is_decoration(current) {
        current = tree.parent(current)?;
    }
    Some(current)
}

/// Encode a single live position
///
/// Returns `None` when the position is not a text leaf under `root`, or the
/// offset is past the end of the leaf.
pub fn encode_position(tree: &DocumentTree, root: NodeId, position: Position) -> Option<Anchor> {
    let leaf_len = tree.text(position.node).map(char_len)?;
    if position.offset > leaf_len || position.node == root || !tree.contains(root, position.node) {
        return None;
    }

    let parent = logical_parent(tree, position.node)?;
    let siblings = logical_children(tree, parent);
    let (run_index, run) = siblings.iter().enumerate().find_map(|(i, child)| match child {
        LogicalChild::Text(run) if run.contains(&position.node) => Some((i, run)),
        _ => None,
    })?;

    let offset = run
        .iter()
        .take_while(|&&leaf| leaf != position.node)
        .filter_map(|&leaf| tree.text(leaf))
        .map(char_len)
        .sum::<usize>()
        + position.offset;

    let mut path = vec![run_index];
    let mut current = parent;
    while current != root {
        let up = logical_parent(tree, current)?;
        let index = logical_children(tree, up)
            .iter()
            .position(|child| *child == LogicalChild::Element(current))?;
        path.push(index);
        current = up;
    }
    path.reverse();

    Some(Anchor::new(path, offset))
}

/// Encode a live range into a span
///
/// The ends are put in document order. Returns `None` if either endpoint is
/// not a text leaf under `root`.
pub fn encode(tree: &DocumentTree, root: NodeId, range: &TextRange) -> Option<Span> {
    let start = encode_position(tree, root, range.start)?;
    let end = encode_position(tree, root, range.end)?;
    Some(Span::new(start, end))
}

/// Resolve an anchor against the live tree
pub fn decode(tree: &DocumentTree, root: NodeId, anchor: &Anchor, affinity: Affinity) -> Resolution {
    let Some((&last, steps)) = anchor.path.split_last() else {
        return Resolution::Unresolved;
    };

    let mut current = root;
    for &index in steps {
        match logical_children(tree, current).get(index) {
            Some(LogicalChild::Element(element)) => current = *element,
            _ => return Resolution::Unresolved,
        }
    }

    match logical_children(tree, current).get(last) {
        Some(LogicalChild::Text(run)) => locate(tree, run, anchor.offset, affinity),
        _ => Resolution::Unresolved,
    }
}

/// Find the physical leaf holding a logical offset within a text run
fn locate(tree: &DocumentTree, run: &[NodeId], offset: usize, affinity: Affinity) -> Resolution {
    let mut run_start = 0;
    let mut last = None;

    for &leaf in run {
        let len = tree.text(leaf).map(char_len).unwrap_or(0);
        let run_end = run_start + len;
        let hit = match affinity {
            Affinity::Forward => offset < run_end,
            Affinity::Backward => offset <= run_end,
        };
        if hit && offset >= run_start {
            return Resolution::Resolved(Position::new(leaf, offset - run_start));
        }
        last = Some((leaf, len));
        run_start = run_end;
    }

    // Forward affinity at the very end of the run lands on the last leaf
    match last {
        Some((leaf, len)) if offset == run_start => Resolution::Resolved(Position::new(leaf, len)),
        _ => Resolution::Unresolved,
    }
}

/// Resolve both ends of a span (start forward, end backward)
pub fn decode_span(tree: &DocumentTree, root: NodeId, span: &Span) -> Option<(Position, Position)> {
    let start = decode(tree, root, &span.start, Affinity::Forward).position()?;
    let end = decode(tree, root, &span.end, Affinity::Backward).position()?;
    Some((start, end))
}

/// Put a live range's ends in document order
pub fn ordered(tree: &DocumentTree, root: NodeId, range: &TextRange) -> Option<TextRange> {
    let leaves = tree.text_leaves(root);
    let start_index = leaves.iter().position(|&l| l == range.start.node)?;
    let end_index = leaves.iter().position(|&l| l == range.end.node)?;

    if (start_index, range.start.offset) <= (end_index, range.end.offset) {
        Some(*range)
    } else {
        Some(TextRange::new(range.end, range.start))
    }
}

/// Elements that flow inside a block rather than starting one
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "cite", "code", "em", "i", "kbd", "mark", "q", "s", "small", "span",
    "strong", "sub", "sup", "u",
];

/// Nearest ancestor element that is not inline (decorations are skipped)
fn block_ancestor(tree: &DocumentTree, leaf: NodeId) -> Option<NodeId> {
    let mut current = tree.parent(leaf)?;
    loop {
        match tree.get(current).map(|node| node.kind()) {
            Some(NodeKind::Element { tag, .. }) if !INLINE_TAGS.contains(&tag.as_str()) => {
                return Some(current)
            }
            _ => current = tree.parent(current)?,
        }
    }
}

/// Text covered by a live range, concatenated across leaves
///
/// Text from different blocks is separated by a newline.
pub fn range_text(tree: &DocumentTree, root: NodeId, range: &TextRange) -> Option<String> {
    let range = ordered(tree, root, range)?;
    let leaves = tree.text_leaves(root);
    let first = leaves.iter().position(|&l| l == range.start.node)?;
    let last = leaves.iter().position(|&l| l == range.end.node)?;

    let mut text = String::new();
    let mut last_block = None;
    for &leaf in &leaves[first..=last] {
        let content = tree.text(leaf)?;
        let from = if leaf == range.start.node { range.start.offset } else { 0 };
        let to = if leaf == range.end.node {
            range.end.offset
        } else {
            char_len(content)
        };
        if to <= from {
            continue;
        }

        let block = block_ancestor(tree, leaf);
        if last_block.is_some() && block != last_block {
            text.push('\n');
        }
        last_block = block;
        text.extend(content.chars().skip(from).take(to - from));
    }
    Some(text)
}
