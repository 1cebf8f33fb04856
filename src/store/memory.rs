//! In-memory annotation store

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AnnotationStore, StoreError};
use crate::highlights::{Highlight, HighlightDraft};

/// In-memory store, cheap to clone (shared state)
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Vec<Highlight>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with highlights
    pub fn with_highlights(highlights: Vec<Highlight>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(highlights)),
        }
    }

    /// Number of stored highlights across all sections
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl AnnotationStore for MemoryStore {
    async fn highlights_for_section(&self, section_id: &str) -> Result<Vec<Highlight>, StoreError> {
        let highlights = self.inner.read().await;
        Ok(highlights
            .iter()
            .filter(|h| h.section_id == section_id)
            .cloned()
            .collect())
    }

    async fn create_highlight(&self, draft: HighlightDraft) -> Result<Highlight, StoreError> {
        let highlight = draft.into_highlight();
        self.inner.write().await.push(highlight.clone());
        Ok(highlight)
    }

    async fn delete_highlight(&self, id: &str) -> Result<bool, StoreError> {
        let mut highlights = self.inner.write().await;
        let before = highlights.len();
        highlights.retain(|h| h.id != id);
        Ok(highlights.len() != before)
    }

    async fn insert_highlight(&self, highlight: &Highlight) -> Result<(), StoreError> {
        let mut highlights = self.inner.write().await;
        if highlights.iter().any(|h| h.id == highlight.id) {
            return Err(StoreError::Conflict(highlight.id.clone()));
        }
        highlights.push(highlight.clone());
        Ok(())
    }
}
