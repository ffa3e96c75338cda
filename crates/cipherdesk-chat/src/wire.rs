//! Request and response bodies of the query collaborators.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use cipherdesk_core::types::{Message, Record, ResultSet};

/// Text used when an answer carries tables but no prose.
pub const RESULTS_TEXT: &str = "Here's what I found:";
/// Text used when an answer carries neither prose nor tables.
pub const EMPTY_ANSWER_TEXT: &str = "I couldn't find any information for your query.";

// =============================================================================
// Conversational endpoint
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
}

/// `data` is either one record or a list of records.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DataPayload {
    Records(Vec<Record>),
    Record(Record),
}

impl DataPayload {
    pub fn into_records(self) -> Vec<Record> {
        match self {
            DataPayload::Records(rows) => rows,
            DataPayload::Record(row) => vec![row],
        }
    }
}

/// Rows grouped by source table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityData {
    pub table_name: String,
    #[serde(default)]
    pub rows: Vec<Record>,
}

/// Encryption details attached by the server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub he_tripwire: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub data: Option<DataPayload>,
    #[serde(default)]
    pub entity_data: Option<Vec<EntityData>>,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<ResponseMetadata>,
    /// Either a literal message or a `true` flag with the text in `response`.
    #[serde(default)]
    pub error: Option<Value>,
}

impl ChatResponse {
    /// The upstream error text, if the server reported one.
    pub fn upstream_error(&self) -> Option<String> {
        match &self.error {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Bool(true)) => Some(
                self.response
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "The assistant reported an error.".to_string()),
            ),
            _ => None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.metadata.as_ref().map(|m| m.encrypted).unwrap_or(false)
    }

    /// Result sets in display order: `data` first, then each entity table.
    pub fn result_sets(&self) -> Vec<ResultSet> {
        let mut sets = Vec::new();
        if let Some(data) = self.data.clone() {
            let rows = data.into_records();
            if !rows.is_empty() {
                sets.push(ResultSet::from_records(None, rows));
            }
        }
        for entity in self.entity_data.iter().flatten() {
            sets.push(ResultSet::from_records(
                Some(entity.table_name.clone()),
                entity.rows.clone(),
            ));
        }
        sets
    }

    /// Build the assistant message, without suggestions.
    pub fn to_message(&self) -> Message {
        if let Some(error) = self.upstream_error() {
            return Message::assistant("The request could not be completed.")
                .with_error(error)
                .with_encrypted(self.is_encrypted());
        }
        let results = self.result_sets();
        let text = match self.response.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ if !results.is_empty() => RESULTS_TEXT.to_string(),
            _ => EMPTY_ANSWER_TEXT.to_string(),
        };
        Message::assistant(text)
            .with_results(results)
            .with_encrypted(self.is_encrypted())
    }
}

// =============================================================================
// Raw-query endpoint
// =============================================================================

/// Body of a raw-query request: the query text under the field name the
/// server reads (`server.raw_query_field`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQueryRequest {
    pub field: String,
    pub query: String,
}

impl RawQueryRequest {
    pub fn new(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            query: query.into(),
        }
    }
}

impl Serialize for RawQueryRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &self.query)?;
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawQueryResponse {
    #[serde(default)]
    pub results: Option<Vec<Record>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub row_count: Option<usize>,
}

impl RawQueryResponse {
    pub fn to_message(&self) -> Message {
        if let Some(error) = self.error.as_ref().filter(|e| !e.is_empty()) {
            return Message::assistant("The query was rejected.").with_error(error.clone());
        }
        let rows = self.results.clone().unwrap_or_default();
        let count = self.row_count.unwrap_or(rows.len());
        let text = match count {
            0 => "The query returned no rows.".to_string(),
            1 => "The query returned 1 row.".to_string(),
            n => format!("The query returned {} rows.", n),
        };
        let results = if rows.is_empty() {
            Vec::new()
        } else {
            vec![ResultSet::from_records(None, rows)]
        };
        Message::assistant(text).with_results(results)
    }
}

// =============================================================================
// Health endpoint
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub database_connected: bool,
    #[serde(default)]
    pub database_error: Option<String>,
}

impl HealthStatus {
    pub fn summary(&self) -> String {
        let db = if self.database_connected {
            "connected".to_string()
        } else {
            match &self.database_error {
                Some(e) => format!("disconnected ({})", e),
                None => "disconnected".to_string(),
            }
        };
        format!("Server status: {}, database: {}", self.status, db)
    }
}

// =============================================================================
// Tests
// =============================================================================
