//! Highlight removal
//!
//! Activating a rendered decoration deletes its highlight. The store is asked
//! first; the tree is only unwrapped once the deletion is confirmed.

use crate::applier::unwrap_highlight;
use crate::section::Section;
use crate::store::{AnnotationStore, StoreError};
use crate::tree::{NodeId, TreeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The activated node is not inside a decoration
    NotDecoration,
    Removed {
        highlight_id: String,
        /// Decorations unwrapped from the tree
        unwrapped: usize,
        /// Whether the store still had the record
        existed: bool,
        /// Overlapping highlights that will be drawn again on the next
        /// reconcile, now that their covered parts are free
        released: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RemovalError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Highlight id of the decoration enclosing `node`, if any
pub fn highlight_at(section: &Section, node: NodeId) -> Option<String> {
    let tree = section.tree();
    if !tree.contains(tree.root(), node) {
        return None;
    }
    let decoration = tree.enclosing_decoration(node)?;
    tree.decoration_tag(decoration)
        .map(|tag| tag.highlight_id.clone())
}

/// Remove the highlight drawn at `node`
pub async fn remove_at(
    section: &mut Section,
    node: NodeId,
    store: &dyn AnnotationStore,
) -> Result<RemovalOutcome, RemovalError> {
    let Some(highlight_id) = highlight_at(section, node) else {
        return Ok(RemovalOutcome::NotDecoration);
    };

    let existed = store.delete_highlight(&highlight_id).await?;

    let (tree, applied, _) = section.parts_mut();
    let root = tree.root();
    let unwrapped = unwrap_highlight(tree, root, &highlight_id)?;
    let released = applied
        .remove(&highlight_id)
        .map(|span| applied.release_overlapping(&span))
        .unwrap_or_default();

    tracing::info!(
        highlight_id = %highlight_id,
        section_id = %section.id(),
        unwrapped,
        existed,
        released = released.len(),
        "Highlight removed"
    );

    Ok(RemovalOutcome::Removed {
        highlight_id,
        unwrapped,
        existed,
        released,
    })
}
