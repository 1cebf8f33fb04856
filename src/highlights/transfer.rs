//! Highlight export/import
//!
//! Export writes a JSON array of persisted records. Import validates each
//! record on its own: malformed records are dropped and counted, never fatal.

use serde_json::Value;
use thiserror::Error;

use super::Highlight;

/// Errors that abort an import as a whole
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Import payload must be a JSON array of highlight records")]
    NotAnArray,
}

/// Outcome of an import
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Well-formed highlights, in input order
    pub highlights: Vec<Highlight>,
    /// Number of records that were dropped
    pub dropped: usize,
}

/// Serialize highlights as a pretty-printed JSON array
pub fn export_highlights(highlights: &[Highlight]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(highlights)
}

/// Parse and validate an exported JSON array
pub fn import_highlights(json: &str) -> Result<ImportReport, ImportError> {
    let Value::Array(records) = serde_json::from_str::<Value>(json)? else {
        return Err(ImportError::NotAnArray);
    };

    let mut report = ImportReport::default();
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Highlight>(record) {
            Ok(highlight) => report.highlights.push(highlight),
            Err(e) => {
                tracing::warn!(index, error = %e, "Dropping malformed highlight record");
                report.dropped += 1;
            }
        }
    }

    tracing::debug!(
        imported = report.highlights.len(),
        dropped = report.dropped,
        "Highlight import parsed"
    );
    Ok(report)
}
