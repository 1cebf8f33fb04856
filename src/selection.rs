//! Selection lifecycle
//!
//! Turns a finished selection gesture into a stored highlight. This is the
//! only path that creates highlight records, and it never touches the tree:
//! decorations appear through the reconcile that follows the store's
//! acknowledgement.

use thiserror::Error;
use tokio::sync::watch;

use crate::anchor::{encode, ordered, range_text, TextRange};
use crate::applier::ReconcileReport;
use crate::highlights::{Highlight, HighlightColor, HighlightDraft};
use crate::section::Section;
use crate::store::{AnnotationStore, StoreError};

/// Host-owned highlight preferences, read but never written here
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightPreferences {
    /// Highlight mode
    pub enabled: bool,
    /// Palette entry for new highlights
    pub color: HighlightColor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    Selecting,
    Committed,
}

/// Why a selection did not become a highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionRejection {
    #[error("highlight mode is off")]
    ModeOff,

    #[error("no active selection")]
    NoSelection,

    #[error("selection is collapsed")]
    Collapsed,

    #[error("selected text is empty")]
    EmptyText,

    #[error("selection is outside the content root")]
    OutsideRoot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Rejected(SelectionRejection),
    Committed {
        highlight: Highlight,
        report: ReconcileReport,
    },
}

pub struct SelectionController {
    state: SelectionState,
    preferences: watch::Receiver<HighlightPreferences>,
}

impl SelectionController {
    pub fn new(preferences: watch::Receiver<HighlightPreferences>) -> Self {
        Self {
            state: SelectionState::Idle,
            preferences,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn preferences(&self) -> HighlightPreferences {
        *self.preferences.borrow()
    }

    /// A selection gesture started. Returns whether it is being tracked.
    pub fn begin(&mut self) -> bool {
        self.state = if self.preferences().enabled {
            SelectionState::Selecting
        } else {
            SelectionState::Idle
        };
        self.state == SelectionState::Selecting
    }

    /// Forget any gesture in progress
    pub fn reset(&mut self) {
        self.state = SelectionState::Idle;
    }

    /// Validate a selection and build the record to store
    pub fn prepare(
        &self,
        section: &Section,
        selection: Option<&TextRange>,
    ) -> Result<HighlightDraft, SelectionRejection> {
        let preferences = self.preferences();
        if !preferences.enabled {
            return Err(SelectionRejection::ModeOff);
        }
        let range = selection.ok_or(SelectionRejection::NoSelection)?;
        if range.is_collapsed() {
            return Err(SelectionRejection::Collapsed);
        }

        let tree = section.tree();
        let root = tree.root();
        let range = ordered(tree, root, range).ok_or(SelectionRejection::OutsideRoot)?;
        let span = encode(tree, root, &range).ok_or(SelectionRejection::OutsideRoot)?;
        if span.is_collapsed() {
            return Err(SelectionRejection::Collapsed);
        }

        let text = range_text(tree, root, &range).ok_or(SelectionRejection::OutsideRoot)?;
        if text.trim().is_empty() {
            return Err(SelectionRejection::EmptyText);
        }

        Ok(HighlightDraft {
            section_id: section.id().to_string(),
            text,
            color: preferences.color,
            span,
        })
    }

    /// Gesture ended: store the selection as a highlight, clear it, and
    /// reconcile against the store's records
    ///
    /// Nothing in the tree changes if the store fails.
    pub async fn commit(
        &mut self,
        section: &mut Section,
        selection: &mut Option<TextRange>,
        store: &dyn AnnotationStore,
    ) -> Result<CommitOutcome, StoreError> {
        let draft = match self.prepare(section, selection.as_ref()) {
            Ok(draft) => draft,
            Err(rejection) => {
                tracing::debug!(section_id = %section.id(), reason = %rejection, "Selection rejected");
                self.state = SelectionState::Idle;
                return Ok(CommitOutcome::Rejected(rejection));
            }
        };

        let highlight = match store.create_highlight(draft).await {
            Ok(highlight) => highlight,
            Err(e) => {
                self.state = SelectionState::Idle;
                return Err(e);
            }
        };
        tracing::info!(
            highlight_id = %highlight.id,
            section_id = %section.id(),
            color = %highlight.color,
            "Highlight created"
        );

        self.state = SelectionState::Committed;
        *selection = None;

        let highlights = store.highlights_for_section(section.id()).await?;
        let report = section.reconcile(&highlights);

        Ok(CommitOutcome::Committed { highlight, report })
    }
}
