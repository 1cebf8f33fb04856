//! Annotation store module
//!
//! The engine consumes highlight persistence through [`AnnotationStore`]. The
//! store is the source of truth: the tree only ever holds a rendering of the
//! records it returns.
//!
//! # Implementations
//!
//! - [`MemoryStore`]: in-process, for tests and embedding
//! - [`SqliteStore`]: SQLite persistence

mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::highlights::{Highlight, HighlightDraft};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Highlight persistence consumed by the engine
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Highlights of a section, oldest first
    async fn highlights_for_section(&self, section_id: &str) -> Result<Vec<Highlight>, StoreError>;

    /// Persist a new highlight and return the stored record
    async fn create_highlight(&self, draft: HighlightDraft) -> Result<Highlight, StoreError>;

    /// Delete a highlight. Returns whether it existed.
    async fn delete_highlight(&self, id: &str) -> Result<bool, StoreError>;

    /// Insert an already identified highlight (import)
    async fn insert_highlight(&self, highlight: &Highlight) -> Result<(), StoreError>;
}

/// Store failures. These are the only failures surfaced to the user.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored record {id} is corrupt: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Highlight already exists: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of importing highlights into a store
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Insert imported highlights, skipping ids that already exist
pub async fn import_into(
    store: &dyn AnnotationStore,
    highlights: &[Highlight],
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();
    for highlight in highlights {
        match store.insert_highlight(highlight).await {
            Ok(()) => summary.inserted += 1,
            Err(StoreError::Conflict(id)) => {
                tracing::debug!(highlight_id = %id, "Skipping existing highlight");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(summary)
}
