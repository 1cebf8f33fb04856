//! Highlight record types
//!
//! A [`Highlight`] serializes to the flat persisted record shape
//! ([`HighlightRecord`]) and deserializes through it, so every record that
//! enters the engine from JSON has already been validated.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::anchor::{Anchor, Span};

/// Fixed highlight palette
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Orange,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 5] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
        HighlightColor::Orange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Pink => "pink",
            HighlightColor::Orange => "orange",
        }
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HighlightColor {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HighlightColor::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| RecordError::UnknownColor(s.to_string()))
    }
}

/// A persisted highlight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HighlightRecord", into = "HighlightRecord")]
pub struct Highlight {
    /// Unique identifier (UUID)
    pub id: String,
    /// The section this highlight belongs to
    pub section_id: String,
    /// Verbatim snapshot of the selected text
    pub text: String,
    pub color: HighlightColor,
    /// Where the highlight sits in the section tree
    pub span: Span,
    pub created_at: DateTime<Utc>,
}

/// A highlight that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightDraft {
    pub section_id: String,
    pub text: String,
    pub color: HighlightColor,
    pub span: Span,
}

impl HighlightDraft {
    /// Assign an id and creation time
    pub fn into_highlight(self) -> Highlight {
        Highlight {
            id: Uuid::new_v4().to_string(),
            section_id: self.section_id,
            text: self.text,
            color: self.color,
            span: self.span,
            created_at: Utc::now(),
        }
    }
}

/// Serialized form of a highlight (export/import, storage)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRecord {
    pub id: String,
    pub section_id: String,
    pub text: String,
    pub color: HighlightColor,
    pub start_path: Vec<usize>,
    pub start_offset: usize,
    pub end_path: Vec<usize>,
    pub end_offset: usize,
    pub created_at: DateTime<Utc>,
}

/// Reasons a record is not a valid highlight
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record has an empty id")]
    EmptyId,

    #[error("Record {0} has an empty section id")]
    EmptySectionId(String),

    #[error("Record {0} has an empty anchor path")]
    EmptyPath(String),

    #[error("Record {0} ends before it starts")]
    InvertedSpan(String),

    #[error("Unknown highlight color: {0}")]
    UnknownColor(String),
}

impl TryFrom<HighlightRecord> for Highlight {
    type Error = RecordError;

    fn try_from(record: HighlightRecord) -> Result<Self, Self::Error> {
        if record.id.trim().is_empty() {
            return Err(RecordError::EmptyId);
        }
        if record.section_id.trim().is_empty() {
            return Err(RecordError::EmptySectionId(record.id));
        }
        if record.start_path.is_empty() || record.end_path.is_empty() {
            return Err(RecordError::EmptyPath(record.id));
        }

        let start = Anchor::new(record.start_path, record.start_offset);
        let end = Anchor::new(record.end_path, record.end_offset);
        if end < start {
            return Err(RecordError::InvertedSpan(record.id));
        }

        Ok(Highlight {
            id: record.id,
            section_id: record.section_id,
            text: record.text,
            color: record.color,
            span: Span { start, end },
            created_at: record.created_at,
        })
    }
}

impl From<Highlight> for HighlightRecord {
    fn from(highlight: Highlight) -> Self {
        HighlightRecord {
            id: highlight.id,
            section_id: highlight.section_id,
            text: highlight.text,
            color: highlight.color,
            start_path: highlight.span.start.path,
            start_offset: highlight.span.start.offset,
            end_path: highlight.span.end.path,
            end_offset: highlight.span.end.offset,
            created_at: highlight.created_at,
        }
    }
}
