//! Append-only record of the conversation.

use uuid::Uuid;

use cipherdesk_core::types::{Message, ResultSet};

use crate::error::ChatError;
use crate::pagination::{PageAction, Pagination};
use crate::table::ResultTable;

/// First message of every session.
pub const GREETING: &str =
    "Hello! I'm your secure financial database assistant. How can I help you today?";

/// A logged message with one page cursor per attached table.
#[derive(Debug, Clone)]
pub struct LogEntry {
    message: Message,
    pages: Vec<Pagination>,
}

impl LogEntry {
    fn new(message: Message, page_size: usize) -> Self {
        let pages = message
            .results
            .iter()
            .map(|set| Pagination::new(set.len(), page_size))
            .collect();
        Self { message, pages }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn table_count(&self) -> usize {
        self.pages.len()
    }

    pub fn table(&self, index: usize) -> Option<ResultTable<'_>> {
        let set = self.message.results.get(index)?;
        let pagination = *self.pages.get(index)?;
        Some(ResultTable::new(set, pagination))
    }

    pub fn tables(&self) -> impl Iterator<Item = ResultTable<'_>> {
        self.message
            .results
            .iter()
            .zip(self.pages.iter())
            .map(|(set, pagination)| ResultTable::new(set, *pagination))
    }

    fn result_set(&self, index: usize) -> Option<&ResultSet> {
        self.message.results.get(index)
    }
}

/// Ordered messages, starting with the greeting.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
    page_size: usize,
}

impl MessageLog {
    pub fn new(page_size: usize) -> Self {
        let greeting = LogEntry::new(Message::assistant(GREETING), page_size);
        Self {
            entries: vec![greeting],
            page_size,
        }
    }

    pub fn append(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.entries.push(LogEntry::new(message, self.page_size));
        id
    }

    /// Drop everything but the greeting.
    pub fn reset(&mut self) {
        self.entries.truncate(1);
        if let Some(greeting) = self.entries.first_mut() {
            for page in &mut greeting.pages {
                page.first();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn get(&self, id: Uuid) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.message.id == id)
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    /// The newest message that carries a table, with the table's index.
    ///
    /// Entries hold their tables in display order, so the last one wins.
    pub fn latest_table(&self) -> Option<(Uuid, usize)> {
        self.entries
            .iter()
            .rev()
            .find(|e| !e.pages.is_empty())
            .map(|e| (e.message.id, e.pages.len() - 1))
    }

    /// Move the page cursor of one table. Returns whether the page changed.
    pub fn page(
        &mut self,
        message_id: Uuid,
        index: usize,
        action: PageAction,
    ) -> Result<bool, ChatError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.message.id == message_id)
            .ok_or(ChatError::MessageNotFound(message_id))?;
        let pagination = entry
            .pages
            .get_mut(index)
            .ok_or(ChatError::TableNotFound { message_id, index })?;
        Ok(pagination.apply(action))
    }

    /// The full result set behind a table, for export.
    pub fn result_set(&self, message_id: Uuid, index: usize) -> Result<&ResultSet, ChatError> {
        let entry = self
            .get(message_id)
            .ok_or(ChatError::MessageNotFound(message_id))?;
        entry
            .result_set(index)
            .ok_or(ChatError::TableNotFound { message_id, index })
    }
}

// =============================================================================
// Tests
// =============================================================================
