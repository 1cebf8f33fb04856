//! Session protocol types

use tokio::sync::oneshot;

use crate::anchor::TextRange;
use crate::applier::ReconcileReport;
use crate::highlights::Highlight;
use crate::selection::SelectionRejection;
use crate::tree::{DocumentTree, NodeId};

// ============================================================================
// Commands
// ============================================================================

/// Gesture source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Pointer,
    Touch,
}

/// Host events, processed one at a time by the session task
#[derive(Debug)]
pub enum SessionCommand {
    /// A section finished rendering
    Mount {
        section_id: String,
        tree: DocumentTree,
    },
    /// The current section was torn down
    Unmount,
    /// The host's native selection changed
    SelectionChanged(Option<TextRange>),
    GestureStart(GestureKind),
    GestureEnd(GestureKind),
    /// A node under the content root was activated (click/tap)
    Activate { node: NodeId },
    /// Re-read the store and reconcile now
    Refresh,
    Snapshot {
        reply: oneshot::Sender<Option<SectionSnapshot>>,
    },
    Shutdown,
}

// ============================================================================
// Notices
// ============================================================================

/// Store operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Load,
    Create,
    Delete,
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StoreOperation::Load => "load",
            StoreOperation::Create => "create",
            StoreOperation::Delete => "delete",
        })
    }
}

/// Events reported back to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    Reconciled {
        section_id: String,
        report: ReconcileReport,
    },
    HighlightCreated(Highlight),
    HighlightRemoved {
        id: String,
    },
    SelectionRejected(SelectionRejection),
    /// The host should clear its native selection
    ClearSelection,
    /// The one failure the user must see
    StoreFailed {
        operation: StoreOperation,
        message: String,
    },
}

/// Copy of the mounted section's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSnapshot {
    pub section_id: String,
    pub tree: DocumentTree,
    pub applied: Vec<String>,
}
