//! Renderable snapshot of one logged message.
//!
//! [`build_fragment`] is pure: every call produces a fresh value from the
//! message and its page cursors, with all cells already redacted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use cipherdesk_core::types::Role;
use cipherdesk_core::RedactionFilter;

use crate::log::LogEntry;
use crate::table::ResultTable;

/// Notice shown under answers that contain encrypted values.
pub const ENCRYPTED_NOTICE: &str = "Some sensitive data is encrypted for security.";

/// State of the page navigation controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageControls {
    pub current_page: usize,
    pub total_pages: usize,
    pub first: bool,
    pub prev: bool,
    pub next: bool,
    pub last: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFragment {
    pub index: usize,
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub caption: String,
    /// `None` when every row fits on one page.
    pub controls: Option<PageControls>,
    pub exportable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub tables: Vec<TableFragment>,
    pub suggestions: Vec<String>,
}

fn table_fragment(index: usize, table: &ResultTable<'_>, filter: &RedactionFilter) -> TableFragment {
    let pagination = table.pagination();
    let controls = pagination.shows_controls().then(|| PageControls {
        current_page: pagination.current_page(),
        total_pages: pagination.total_pages(),
        first: pagination.can_first(),
        prev: pagination.can_prev(),
        next: pagination.can_next(),
        last: pagination.can_last(),
    });
    TableFragment {
        index,
        title: table.title().map(str::to_string),
        headers: table.headers(),
        rows: table.page_rows(filter),
        caption: table.caption(),
        controls,
        exportable: pagination.total_items() > 0,
    }
}

/// Build the fragment for a log entry.
pub fn build_fragment(entry: &LogEntry, filter: &RedactionFilter) -> Fragment {
    let message = entry.message();
    let tables = entry
        .tables()
        .enumerate()
        .map(|(i, table)| table_fragment(i, &table, filter))
        .collect();
    Fragment {
        id: message.id,
        role: message.role,
        text: message.text.clone(),
        timestamp: message.timestamp,
        notice: message.encrypted.then(|| ENCRYPTED_NOTICE.to_string()),
        error: message.error.clone(),
        tables,
        suggestions: message.suggestions.clone().unwrap_or_default(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MessageLog;
    use crate::pagination::PageAction;
    use cipherdesk_core::types::{Message, ResultSet};
    use serde_json::json;

    fn set(n: usize) -> ResultSet {
        let rows = (0..n)
            .map(|i| {
                json!({"broker_id": i, "license_number": "[ENCRYPTED:9f2c]"})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        ResultSet::from_records(Some("brokers".into()), rows)
    }

    #[test]
    fn test_plain_message() {
        let log = MessageLog::new(10);
        let fragment = build_fragment(&log.entries()[0], &RedactionFilter::new());
        assert_eq!(fragment.role, Role::Assistant);
        assert!(fragment.tables.is_empty());
        assert!(fragment.notice.is_none());
        assert!(fragment.suggestions.is_empty());
    }

    #[test]
    fn test_small_table_has_no_controls() {
        let mut log = MessageLog::new(10);
        let id = log.append(Message::assistant("found").with_results(vec![set(4)]));
        let fragment = build_fragment(log.get(id).unwrap(), &RedactionFilter::new());
        let table = &fragment.tables[0];
        assert_eq!(table.headers, vec!["Broker Id", "License Number"]);
        assert_eq!(table.rows.len(), 4);
        assert!(table.controls.is_none());
        assert!(table.exportable);
        assert_eq!(table.title.as_deref(), Some("brokers"));
        assert!(table.rows.iter().all(|r| r[1] == "Encrypted 🔒"));
    }

    #[test]
    fn test_controls_reflect_page() {
        let mut log = MessageLog::new(10);
        let id = log.append(Message::assistant("found").with_results(vec![set(15)]));
        let filter = RedactionFilter::new();

        let controls = build_fragment(log.get(id).unwrap(), &filter).tables[0]
            .controls
            .unwrap();
        assert!(!controls.first && !controls.prev);
        assert!(controls.next && controls.last);

        log.page(id, 0, PageAction::Next).unwrap();
        let fragment = build_fragment(log.get(id).unwrap(), &filter);
        let table = &fragment.tables[0];
        let controls = table.controls.unwrap();
        assert!(controls.first && controls.prev);
        assert!(!controls.next && !controls.last);
        assert_eq!(table.rows.len(), 5);
        assert_eq!(table.caption, "Showing 11-15 of 15 records");
    }

    #[test]
    fn test_encrypted_notice_and_error() {
        let mut log = MessageLog::new(10);
        let id = log.append(
            Message::assistant("failed")
                .with_error("Only SELECT queries are allowed")
                .with_encrypted(true),
        );
        let fragment = build_fragment(log.get(id).unwrap(), &RedactionFilter::new());
        assert_eq!(fragment.notice.as_deref(), Some(ENCRYPTED_NOTICE));
        assert_eq!(fragment.error.as_deref(), Some("Only SELECT queries are allowed"));
    }

    #[test]
    fn test_empty_table_not_exportable() {
        let mut log = MessageLog::new(10);
        let id = log.append(Message::assistant("none").with_results(vec![set(0)]));
        let fragment = build_fragment(log.get(id).unwrap(), &RedactionFilter::new());
        assert!(!fragment.tables[0].exportable);
        assert_eq!(fragment.tables[0].caption, "No records");
    }
}
