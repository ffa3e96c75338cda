//! CSV export of result records.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use cipherdesk_core::types::Record;
use cipherdesk_core::RedactionFilter;

use crate::error::ChatError;

/// Prefix of every exported file name.
pub const FILE_PREFIX: &str = "query_results";

/// Encodes records as comma-separated text.
#[derive(Debug, Clone, Default)]
pub struct ExportEncoder {
    filter: RedactionFilter,
}

impl ExportEncoder {
    pub fn new(filter: RedactionFilter) -> Self {
        Self { filter }
    }

    /// Header from the first record's keys, then one line per record.
    ///
    /// # Errors
    /// [`ChatError::NothingToExport`] when `records` is empty.
    pub fn encode(&self, records: &[Record]) -> Result<String, ChatError> {
        let first = records.first().ok_or(ChatError::NothingToExport)?;
        let columns: Vec<&String> = first.keys().collect();

        let mut lines = Vec::with_capacity(records.len() + 1);
        lines.push(
            columns
                .iter()
                .map(|c| quote_field(c))
                .collect::<Vec<_>>()
                .join(","),
        );
        for record in records {
            let line = columns
                .iter()
                .map(|column| quote_field(&self.filter.render_field(record, column)))
                .collect::<Vec<_>>()
                .join(",");
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }

    /// Encode and write to `dir` under a timestamped name.
    pub fn write_to(
        &self,
        records: &[Record],
        dir: &Path,
        now: DateTime<Local>,
    ) -> Result<PathBuf, ChatError> {
        let body = self.encode(records)?;
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name(now));
        fs::write(&path, body)?;
        info!(path = %path.display(), rows = records.len(), "Exported results");
        Ok(path)
    }
}

/// `query_results_YYYYMMDD_HHMM.csv`
pub fn file_name(now: DateTime<Local>) -> String {
    format!("{}_{}.csv", FILE_PREFIX, now.format("%Y%m%d_%H%M"))
}

/// Quote a field when it holds a comma, quote or line break.
pub fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
