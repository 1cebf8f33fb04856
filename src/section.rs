//! The mounted section
//!
//! A [`Section`] bundles the section id, its live tree and the per-section
//! applied state. Mounting another section means building a new `Section`,
//! so applied ids and miss counters never leak across sections.

use crate::applier::{self, AppliedSet, MissCounter, ReconcileReport};
use crate::highlights::Highlight;
use crate::tree::DocumentTree;

#[derive(Debug, Clone)]
pub struct Section {
    id: String,
    tree: DocumentTree,
    applied: AppliedSet,
    misses: MissCounter,
    stale_after: Option<u32>,
}

impl Section {
    pub fn new(id: impl Into<String>, tree: DocumentTree) -> Self {
        Self {
            id: id.into(),
            tree,
            applied: AppliedSet::new(),
            misses: MissCounter::default(),
            stale_after: None,
        }
    }

    /// Report highlights as stale after this many unresolved reconciles
    pub fn with_stale_after(mut self, attempts: Option<u32>) -> Self {
        self.stale_after = attempts;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn applied(&self) -> &AppliedSet {
        &self.applied
    }

    pub fn stale_after(&self) -> Option<u32> {
        self.stale_after
    }

    /// Sync decorations to `highlights`
    pub fn reconcile(&mut self, highlights: &[Highlight]) -> ReconcileReport {
        applier::reconcile(self, highlights)
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut DocumentTree, &mut AppliedSet, &mut MissCounter) {
        (&mut self.tree, &mut self.applied, &mut self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{Anchor, Span};
    use crate::highlights::{HighlightColor, HighlightDraft};

    fn tree() -> DocumentTree {
        let mut tree = DocumentTree::new("section");
        let root = tree.root();
        let p = tree.append_element(root, "p").unwrap();
        tree.append_text(p, "Photosynthesis happens in chloroplasts.").unwrap();
        tree
    }

    fn draft(section: &str) -> Highlight {
        HighlightDraft {
            section_id: section.to_string(),
            text: "Photosynthesis".to_string(),
            color: HighlightColor::Green,
            span: Span::new(Anchor::new(vec![0, 0], 0), Anchor::new(vec![0, 0], 14)),
        }
        .into_highlight()
    }

    #[test]
    fn test_new_section_has_fresh_applied_set() {
        let highlight = draft("chapter-1");
        let mut first = Section::new("chapter-1", tree());
        first.reconcile(std::slice::from_ref(&highlight));
        assert!(first.applied().contains(&highlight.id));

        let second = Section::new("chapter-2", tree());
        assert!(second.applied().is_empty());
        assert!(second.tree().decorations(second.tree().root()).is_empty());
    }

    #[test]
    fn test_remount_reapplies() {
        let highlight = draft("chapter-1");
        let mut section = Section::new("chapter-1", tree());
        section.reconcile(std::slice::from_ref(&highlight));

        // Navigating back rebuilds the tree from scratch
        let mut again = Section::new("chapter-1", tree());
        let report = again.reconcile(std::slice::from_ref(&highlight));
        assert_eq!(report.applied, vec![highlight.id.clone()]);
        assert_eq!(again.tree(), section.tree());
    }

    #[test]
    fn test_arena_growth_ends_with_the_section() {
        let highlight = draft("chapter-1");
        let mut section = Section::new("chapter-1", tree());
        let root = section.tree().root();
        let live = section.tree().descendants(root).len();
        let fresh = section.tree().arena_len();

        for _ in 0..5 {
            section.reconcile(std::slice::from_ref(&highlight));
            section.reconcile(&[]);
            assert_eq!(section.tree().descendants(root).len(), live);
        }
        assert!(section.tree().arena_len() > fresh);

        let remounted = Section::new("chapter-1", tree());
        assert_eq!(remounted.tree().arena_len(), fresh);
    }
}
