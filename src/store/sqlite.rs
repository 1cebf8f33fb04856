//! SQLite storage for highlights
//!
//! Anchor paths are stored as JSON arrays; timestamps as RFC 3339 text.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::{AnnotationStore, StoreError};
use crate::highlights::{Highlight, HighlightColor, HighlightDraft, HighlightRecord};

/// SQLite-backed highlight store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool. Call [`SqliteStore::init`] before use.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect (creating the database file if needed) and initialize the schema
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.init().await?;
        tracing::info!("Highlight store ready at {}", url);
        Ok(store)
    }

    /// Initialize the highlights table
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS highlights (
                id TEXT PRIMARY KEY,
                section_id TEXT NOT NULL,
                text TEXT NOT NULL,
                color TEXT NOT NULL,
                start_path TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_path TEXT NOT NULL,
                end_offset INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_highlights_section ON highlights(section_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Count highlights for a section
    pub async fn count_for_section(&self, section_id: &str) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM highlights WHERE section_id = ?")
            .bind(section_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    /// Insert unless the id is taken. Returns whether a row was written.
    async fn insert(&self, highlight: &Highlight) -> Result<bool, StoreError> {
        let start_path = serde_json::to_string(&highlight.span.start.path)?;
        let end_path = serde_json::to_string(&highlight.span.end.path)?;

        let result = sqlx::query(
            r#"
            INSERT INTO highlights (
                id, section_id, text, color, start_path, start_offset,
                end_path, end_offset, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&highlight.id)
        .bind(&highlight.section_id)
        .bind(&highlight.text)
        .bind(highlight.color.as_str())
        .bind(&start_path)
        .bind(highlight.span.start.offset as i64)
        .bind(&end_path)
        .bind(highlight.span.end.offset as i64)
        .bind(highlight.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AnnotationStore for SqliteStore {
    async fn highlights_for_section(&self, section_id: &str) -> Result<Vec<Highlight>, StoreError> {
        let rows = sqlx::query_as::<_, HighlightRow>(
            r#"
            SELECT id, section_id, text, color, start_path, start_offset,
                   end_path, end_offset, created_at
            FROM highlights
            WHERE section_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await?;

        let highlights = rows
            .into_iter()
            .filter_map(|row| match row.into_highlight() {
                Ok(highlight) => Some(highlight),
                Err(e) => {
                    tracing::warn!(section_id = %section_id, error = %e, "Skipping stored highlight");
                    None
                }
            })
            .collect();

        Ok(highlights)
    }

    async fn create_highlight(&self, draft: HighlightDraft) -> Result<Highlight, StoreError> {
        let highlight = draft.into_highlight();
        if !self.insert(&highlight).await? {
            return Err(StoreError::Conflict(highlight.id));
        }
        tracing::debug!(highlight_id = %highlight.id, section_id = %highlight.section_id, "Highlight stored");
        Ok(highlight)
    }

    async fn delete_highlight(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM highlights WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_highlight(&self, highlight: &Highlight) -> Result<(), StoreError> {
        if !self.insert(highlight).await? {
            return Err(StoreError::Conflict(highlight.id.clone()));
        }
        Ok(())
    }
}

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct HighlightRow {
    id: String,
    section_id: String,
    text: String,
    color: String,
    start_path: String,
    start_offset: i64,
    end_path: String,
    end_offset: i64,
    created_at: String,
}

impl HighlightRow {
    fn into_highlight(self) -> Result<Highlight, StoreError> {
        let id = self.id.clone();
        let corrupt = |reason: String| StoreError::CorruptRecord {
            id: id.clone(),
            reason,
        };

        let color = HighlightColor::from_str(&self.color).map_err(|e| corrupt(e.to_string()))?;
        let start_path: Vec<usize> =
            serde_json::from_str(&self.start_path).map_err(|e| corrupt(format!("start path: {}", e)))?;
        let end_path: Vec<usize> =
            serde_json::from_str(&self.end_path).map_err(|e| corrupt(format!("end path: {}", e)))?;
        let start_offset = usize::try_from(self.start_offset)
            .map_err(|_| corrupt(format!("negative start offset {}", self.start_offset)))?;
        let end_offset = usize::try_from(self.end_offset)
            .map_err(|_| corrupt(format!("negative end offset {}", self.end_offset)))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt(format!("timestamp: {}", e)))?
            .with_timezone(&Utc);

        let record = HighlightRecord {
            id: self.id,
            section_id: self.section_id,
            text: self.text,
            color,
            start_path,
            start_offset,
            end_path,
            end_offset,
            created_at,
        };

        Highlight::try_from(record).map_err(|e| corrupt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{Anchor, Span};

    async fn setup_test_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn draft(section: &str, color: HighlightColor) -> HighlightDraft {
        HighlightDraft {
            section_id: section.to_string(),
            text: "glucose metabolism".to_string(),
            color,
            span: Span::new(Anchor::new(vec![1, 0], 0), Anchor::new(vec![1, 2], 5)),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = setup_test_store().await;

        let created = store
            .create_highlight(draft("chapter-1", HighlightColor::Orange))
            .await
            .unwrap();
        store
            .create_highlight(draft("chapter-2", HighlightColor::Blue))
            .await
            .unwrap();

        let listed = store.highlights_for_section("chapter-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].span, created.span);
        assert_eq!(listed[0].color, HighlightColor::Orange);
        assert_eq!(store.count_for_section("chapter-2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = setup_test_store().await;
        let created = store
            .create_highlight(draft("chapter-1", HighlightColor::Yellow))
            .await
            .unwrap();

        assert!(store.delete_highlight(&created.id).await.unwrap());
        assert!(!store.delete_highlight(&created.id).await.unwrap());
        assert!(store
            .highlights_for_section("chapter-1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_insert_conflict() {
        let store = setup_test_store().await;
        let highlight = draft("chapter-1", HighlightColor::Pink).into_highlight();

        store.insert_highlight(&highlight).await.unwrap();
        assert!(matches!(
            store.insert_highlight(&highlight).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("highlights.db").display());

        let id = {
            let store = SqliteStore::connect(&url).await.unwrap();
            store
                .create_highlight(draft("chapter-1", HighlightColor::Green))
                .await
                .unwrap()
                .id
        };

        let reopened = SqliteStore::connect(&url).await.unwrap();
        let listed = reopened.highlights_for_section("chapter-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_insert() {
        let store = setup_test_store().await;
        let highlight = draft("chapter-1", HighlightColor::Green).into_highlight();

        let (a, b) = tokio::join!(
            store.insert_highlight(&highlight),
            store.insert_highlight(&highlight)
        );
        let conflicts = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Conflict(_))))
            .count();
        assert!(a.is_ok() || b.is_ok());
        assert_eq!(conflicts, 1);
        assert_eq!(store.count_for_section("chapter-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_skipped() {
        let store = setup_test_store().await;
        let good = store
            .create_highlight(draft("chapter-1", HighlightColor::Yellow))
            .await
            .unwrap();

        let raw = |id: &'static str, offset: i64, created_at: &'static str| {
            sqlx::query(
                r#"
                INSERT INTO highlights (
                    id, section_id, text, color, start_path, start_offset,
                    end_path, end_offset, created_at
                ) VALUES (?, 'chapter-1', 'text', 'yellow', '[0,0]', ?, '[0,0]', 4, ?)
                "#,
            )
            .bind(id)
            .bind(offset)
            .bind(created_at)
        };
        raw("negative-offset", -3, "2024-01-01T00:00:00Z")
            .execute(&store.pool)
            .await
            .unwrap();
        raw("bad-timestamp", 0, "yesterday")
            .execute(&store.pool)
            .await
            .unwrap();

        let listed = store.highlights_for_section("chapter-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, good.id);
        assert_eq!(store.count_for_section("chapter-1").await.unwrap(), 3);
    }

    #[test]
    fn test_negative_offset_is_corrupt() {
        let row = HighlightRow {
            id: "h1".to_string(),
            section_id: "chapter-1".to_string(),
            text: "text".to_string(),
            color: "yellow".to_string(),
            start_path: "[0,0]".to_string(),
            start_offset: -1,
            end_path: "[0,0]".to_string(),
            end_offset: 4,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        };
        assert!(matches!(
            row.into_highlight(),
            Err(StoreError::CorruptRecord { id, .. }) if id == "h1"
        ));
    }
}
