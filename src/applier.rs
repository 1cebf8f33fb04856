//! Highlight applier
//!
//! Brings a section tree's decorations in sync with a set of highlight
//! records. [`reconcile`] is idempotent and safe to re-run after any render or
//! store mutation:
//!
//! 1. Prune decorations whose highlight is no longer in the set
//! 2. Decode each pending highlight's span; skip it silently if it does not
//!    resolve
//! 3. Wrap every text leaf the span covers, skipping leaves that already sit
//!    inside a decoration
//! 4. Mark the highlight applied only once all of its leaves succeeded

use std::collections::{HashMap, HashSet};

use crate::anchor::{decode_span, Span};
use crate::highlights::Highlight;
use crate::section::Section;
use crate::tree::{DecorationTag, DocumentTree, NodeId, TreeError};

/// Highlights currently decorated in one section's tree, with their spans
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedSet {
    spans: HashMap<String, Span>,
}

impl AppliedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.spans.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Applied ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.spans.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn insert(&mut self, id: &str, span: &Span) {
        self.spans.insert(id.to_string(), span.clone());
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Span> {
        self.spans.remove(id)
    }

    pub(crate) fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.spans.retain(|id, _| keep(id));
    }

    /// Forget every highlight overlapping `span` so the next reconcile
    /// draws the parts that were yielding to it. Returns the released ids.
    pub(crate) fn release_overlapping(&mut self, span: &Span) -> Vec<String> {
        let mut released: Vec<String> = self
            .spans
            .iter()
            .filter(|(_, applied)| applied.overlaps(span))
            .map(|(id, _)| id.clone())
            .collect();
        released.sort();
        for id in &released {
            self.spans.remove(id);
        }
        released
    }
}

/// What a reconcile pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Highlights whose decorations were removed
    pub pruned: Vec<String>,
    /// Highlights decorated in this pass
    pub applied: Vec<String>,
    /// Highlights whose span did not resolve
    pub unresolved: Vec<String>,
    /// Highlights with nothing left to decorate (covered by earlier ones)
    pub shadowed: Vec<String>,
    /// Highlights that failed mid-way and were rolled back
    pub failed: Vec<String>,
    /// Unresolved highlights past the configured miss threshold
    pub stale: Vec<String>,
}

impl ReconcileReport {
    /// Nothing changed in the tree
    pub fn is_noop(&self) -> bool {
        self.pruned.is_empty() && self.applied.is_empty()
    }
}

/// Per-highlight outcome of the apply step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyOutcome {
    Applied { decorations: usize },
    Unresolved,
    Shadowed,
}

/// Unresolved-attempt counters for one section
#[derive(Debug, Clone, Default)]
pub(crate) struct MissCounter {
    misses: HashMap<String, u32>,
}

impl MissCounter {
    fn record(&mut self, id: &str) -> u32 {
        let count = self.misses.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn clear(&mut self, id: &str) {
        self.misses.remove(id);
    }

    fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.misses.retain(|id, _| keep(id));
    }
}

/// Sync the section's decorations to `highlights`
pub fn reconcile(section: &mut Section, highlights: &[Highlight]) -> ReconcileReport {
    reconcile_with(section, highlights, DocumentTree::wrap_text_slice)
}

/// [`reconcile`] with the leaf-wrapping step supplied by the caller
fn reconcile_with<W>(section: &mut Section, highlights: &[Highlight], mut wrap: W) -> ReconcileReport
where
    W: FnMut(&mut DocumentTree, NodeId, usize, usize, DecorationTag) -> Result<NodeId, TreeError>,
{
    let stale_after = section.stale_after();
    let section_id = section.id().to_string();
    let (tree, applied, misses) = section.parts_mut();
    let root = tree.root();
    let mut report = ReconcileReport::default();

    let wanted: HashSet<&str> = highlights.iter().map(|h| h.id.as_str()).collect();

    // Prune
    for decoration in tree.decorations(root) {
        let Some(id) = tree
            .decoration_tag(decoration)
            .map(|tag| tag.highlight_id.clone())
        else {
            continue;
        };
        if wanted.contains(id.as_str()) {
            continue;
        }
        match tree.unwrap_decoration(decoration) {
            Ok(_) => {
                if !report.pruned.contains(&id) {
                    report.pruned.push(id);
                }
            }
            Err(e) => {
                tracing::warn!(highlight_id = %id, error = %e, "Failed to unwrap stale decoration");
            }
        }
    }
    applied.retain(|id| wanted.contains(id));
    misses.retain(|id| wanted.contains(id));

    // Apply
    for highlight in highlights {
        if applied.contains(&highlight.id) {
            continue;
        }

        match apply_highlight(tree, root, highlight, &mut wrap) {
            Ok(ApplyOutcome::Applied { decorations }) => {
                tracing::trace!(highlight_id = %highlight.id, decorations, "Highlight applied");
                applied.insert(&highlight.id, &highlight.span);
                misses.clear(&highlight.id);
                report.applied.push(highlight.id.clone());
            }
            Ok(ApplyOutcome::Unresolved) => {
                let count = misses.record(&highlight.id);
                if stale_after.is_some_and(|limit| count >= limit) {
                    report.stale.push(highlight.id.clone());
                }
                report.unresolved.push(highlight.id.clone());
            }
            Ok(ApplyOutcome::Shadowed) => {
                report.shadowed.push(highlight.id.clone());
            }
            Err(e) => {
                tracing::warn!(
                    highlight_id = %highlight.id,
                    section_id = %section_id,
                    error = %e,
                    "Failed to apply highlight, rolling back"
                );
                if let Err(rollback) = unwrap_highlight(tree, root, &highlight.id) {
                    tracing::warn!(highlight_id = %highlight.id, error = %rollback, "Rollback incomplete");
                }
                report.failed.push(highlight.id.clone());
            }
        }
    }

    if !report.is_noop() {
        tracing::debug!(
            section_id = %section_id,
            pruned = report.pruned.len(),
            applied = report.applied.len(),
            unresolved = report.unresolved.len(),
            "Reconciled highlights"
        );
    }
    report
}

fn apply_highlight<W>(
    tree: &mut DocumentTree,
    root: NodeId,
    highlight: &Highlight,
    wrap: &mut W,
) -> Result<ApplyOutcome, TreeError>
where
    W: FnMut(&mut DocumentTree, NodeId, usize, usize, DecorationTag) -> Result<NodeId, TreeError>,
{
    let Some((start, end)) = decode_span(tree, root, &highlight.span) else {
        return Ok(ApplyOutcome::Unresolved);
    };

    let leaves = tree.text_leaves(root);
    let (Some(first), Some(last)) = (
        leaves.iter().position(|&l| l == start.node),
        leaves.iter().position(|&l| l == end.node),
    ) else {
        return Ok(ApplyOutcome::Unresolved);
    };
    if first > last {
        return Ok(ApplyOutcome::Unresolved);
    }

    let tag = DecorationTag::new(highlight.id.as_str(), highlight.color);
    let mut decorations = 0;
    let mut already_ours = 0;

    for &leaf in &leaves[first..=last] {
        if let Some(existing) = tree.enclosing_decoration(leaf) {
            if tree
                .decoration_tag(existing)
                .is_some_and(|t| t.highlight_id == highlight.id)
            {
                already_ours += 1;
            }
            continue;
        }

        let len = tree.text_len(leaf)?;
        let slice_start = if leaf == start.node { start.offset } else { 0 };
        let slice_end = if leaf == end.node { end.offset } else { len };
        if slice_start >= slice_end {
            continue;
        }

        wrap(tree, leaf, slice_start, slice_end, tag.clone())?;
        decorations += 1;
    }

    if decorations + already_ours == 0 {
        Ok(ApplyOutcome::Shadowed)
    } else {
        Ok(ApplyOutcome::Applied { decorations })
    }
}

/// Unwrap every decoration of one highlight and normalize the text around it.
/// Returns the number of decorations removed.
pub(crate) fn unwrap_highlight(
    tree: &mut DocumentTree,
    root: NodeId,
    highlight_id: &str,
) -> Result<usize, TreeError> {
    let targets: Vec<NodeId> = tree
        .decorations(root)
        .into_iter()
        .filter(|&d| {
            tree.decoration_tag(d)
                .is_some_and(|t| t.highlight_id == highlight_id)
        })
        .collect();

    for &decoration in &targets {
        tree.unwrap_decoration(decoration)?;
    }
    Ok(targets.len())
}
