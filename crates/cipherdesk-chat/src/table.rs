//! Paged, redacted view of a result set.

use cipherdesk_core::types::{Record, ResultSet};
use cipherdesk_core::RedactionFilter;

use crate::pagination::Pagination;

/// Turn a column name into a header: split on separators, capitalize each word.
///
/// `account_balance` becomes `Account Balance`.
pub fn header_label(column: &str) -> String {
    column
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// A result set seen through its page cursor.
#[derive(Debug, Clone, Copy)]
pub struct ResultTable<'a> {
    set: &'a ResultSet,
    pagination: Pagination,
}

impl<'a> ResultTable<'a> {
    pub fn new(set: &'a ResultSet, pagination: Pagination) -> Self {
        Self { set, pagination }
    }

    pub fn title(&self) -> Option<&str> {
        self.set.title.as_deref()
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn headers(&self) -> Vec<String> {
        self.set.columns.iter().map(|c| header_label(c)).collect()
    }

    /// Raw records of the active page.
    pub fn page_records(&self) -> &'a [Record] {
        let range = self.pagination.range();
        self.set.rows.get(range).unwrap_or(&[])
    }

    /// Rendered cells of the active page only.
    pub fn page_rows(&self, filter: &RedactionFilter) -> Vec<Vec<String>> {
        self.page_records()
            .iter()
            .map(|record| {
                self.set
                    .columns
                    .iter()
                    .map(|column| filter.render_field(record, column))
                    .collect()
            })
            .collect()
    }

    pub fn caption(&self) -> String {
        self.pagination.caption()
    }
}

// =============================================================================
// Tests
// =============================================================================
