//! Document tree module
//!
//! An arena-backed content tree for one rendered section. Nodes are addressed
//! by [`NodeId`] indices into the arena, which stay valid for the lifetime of
//! the tree instance but carry no meaning across re-renders.
//!
//! # Node kinds
//!
//! - Elements (`p`, `em`, `section`, ...) with attributes
//! - Text leaves
//! - Decorations: non-semantic highlight wrappers around text
//!
//! Decorations can only be created or removed from inside the crate (the
//! highlight applier and the removal controller). Hosts build the tree through
//! [`DocumentTree::append_element`] / [`DocumentTree::append_text`] or
//! [`DocumentTree::from_content`].

mod content;
mod document;
mod error;
mod html;
mod types;

pub use content::{load_section, ContentNode, SectionContent};
pub use document::DocumentTree;
pub use error::TreeError;
pub use html::{render_html, HighlightConfig};
pub use types::{DecorationTag, Node, NodeId, NodeKind};

/// Number of characters (Unicode scalar values) in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the character at `char_offset`, or the string length when
/// the offset is exactly at the end
pub(crate) fn byte_index(text: &str, char_offset: usize) -> Option<usize> {
    if char_offset == 0 {
        return Some(0);
    }
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .nth(char_offset)
}
