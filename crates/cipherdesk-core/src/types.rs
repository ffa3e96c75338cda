use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Input mode of a session. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Natural-language questions routed to the conversational endpoint.
    #[default]
    Conversational,
    /// Read-only query text sent verbatim to the raw-query endpoint.
    RawQuery,
}

impl Mode {
    /// The other mode.
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Conversational => Mode::RawQuery,
            Mode::RawQuery => Mode::Conversational,
        }
    }

    /// Short prompt shown in front of the input line.
    pub fn prompt(self) -> &'static str {
        match self {
            Mode::Conversational => "ask> ",
            Mode::RawQuery => "sql> ",
        }
    }

    /// Placeholder describing what the input accepts in this mode.
    pub fn placeholder(self) -> &'static str {
        match self {
            Mode::Conversational => "Ask a question about the financial database...",
            Mode::RawQuery => "Enter a read-only SELECT query...",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Conversational => write!(f, "Conversational"),
            Mode::RawQuery => write!(f, "RawQuery"),
        }
    }
}

// =============================================================================
// Result sets
// =============================================================================

/// One row of a result set: column name to value, in wire order.
pub type Record = serde_json::Map<String, Value>;

/// Tabular query result attached to an assistant message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Optional caption, e.g. the source table name.
    pub title: Option<String>,
    /// Unique column names in first-seen order across all rows.
    pub columns: Vec<String>,
    /// Rows in the order the server returned them.
    pub rows: Vec<Record>,
}

impl ResultSet {
    /// Build a result set, deriving the column list from the rows.
    pub fn from_records(title: Option<String>, rows: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self {
            title,
            columns,
            rows,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A single exchanged chat message.
///
/// Built completely before it is appended to the log and never changed after.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Result tables carried by this message, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<ResultSet>,
    /// Follow-up query suggestions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    /// Literal error text from the query collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the server reported encryption for this answer.
    #[serde(default)]
    pub encrypted: bool,
}

impl Message {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            results: Vec::new(),
            suggestions: None,
            error: None,
            encrypted: false,
        }
    }

    /// A message typed (or dictated) by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// A message produced by the assistant side.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn with_results(mut self, results: Vec<ResultSet>) -> Self {
        self.results = results;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    /// The first attached result set, if any.
    pub fn result(&self) -> Option<&ResultSet> {
        self.results.first()
    }
}

// =============================================================================
// Tests
// =============================================================================
