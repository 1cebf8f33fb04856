//! Highlight module
//!
//! The persisted highlight record, its palette, and JSON export/import.
//!
//! A highlight's `text` is a snapshot taken when the selection was committed.
//! It is never re-derived from the live tree, so it stays valid for display
//! and export even when the anchor no longer resolves.

mod transfer;
mod types;

pub use transfer::{export_highlights, import_highlights, ImportError, ImportReport};
pub use types::{Highlight, HighlightColor, HighlightDraft, HighlightRecord, RecordError};
