//! Presentation-side redaction of protected field values.
//!
//! The query server marks ciphertexts it will not reveal. This module decides,
//! per value, whether to show the literal text or a fixed protected label.
//! Nothing is decrypted here; the filter only keeps the marker and payload off
//! the screen and out of exported files.

use serde_json::Value;

use crate::types::Record;

/// Prefix identifying a textual value as protected.
pub const SENTINEL_MARKER: &str = "[ENCRYPTED:";

/// Fixed text shown in place of any protected value.
pub const PROTECTED_RENDERING: &str = "Encrypted 🔒";

/// A single redaction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionRule {
    /// Textual value starting with the given prefix.
    TextPrefix(&'static str),
    /// Object whose `field` equals `tag`, e.g. `{"type": "encrypted", ...}`.
    TaggedObject {
        field: &'static str,
        tag: &'static str,
    },
}

impl RedactionRule {
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (RedactionRule::TextPrefix(prefix), Value::String(s)) => s.starts_with(prefix),
            (RedactionRule::TaggedObject { field, tag }, Value::Object(map)) => {
                map.get(*field).and_then(Value::as_str) == Some(*tag)
            }
            _ => false,
        }
    }
}

/// Rules evaluated in order; the first match protects the value.
pub const DEFAULT_RULES: &[RedactionRule] = &[
    RedactionRule::TextPrefix(SENTINEL_MARKER),
    RedactionRule::TaggedObject {
        field: "type",
        tag: "encrypted",
    },
];

/// Decides per value whether to show it or the protected label.
#[derive(Debug, Clone, Copy)]
pub struct RedactionFilter {
    rules: &'static [RedactionRule],
}

impl Default for RedactionFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl RedactionFilter {
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES,
        }
    }

    /// Build a filter over a custom rule table.
    pub fn with_rules(rules: &'static [RedactionRule]) -> Self {
        Self { rules }
    }

    /// Whether this exact value is protected.
    pub fn is_protected(&self, value: &Value) -> bool {
        self.rules.iter().any(|rule| rule.matches(value))
    }

    /// Render a value for display.
    ///
    /// Protected values become [`PROTECTED_RENDERING`], null becomes the empty
    /// string, strings are shown as-is and everything else uses its JSON text.
    /// Protected values nested inside arrays or objects are replaced before
    /// the composite is rendered.
    pub fn render(&self, value: &Value) -> String {
        if self.is_protected(value) {
            return PROTECTED_RENDERING.to_string();
        }
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(_) | Value::Number(_) => value.to_string(),
            Value::Array(_) | Value::Object(_) => self.scrub(value).to_string(),
        }
    }

    /// Render a field of a record; a missing field renders like null.
    pub fn render_field(&self, record: &Record, column: &str) -> String {
        record
            .get(column)
            .map(|v| self.render(v))
            .unwrap_or_default()
    }

    fn scrub(&self, value: &Value) -> Value {
        if self.is_protected(value) {
            return Value::String(PROTECTED_RENDERING.to_string());
        }
        match value {
            Value::Array(items) => Value::Array(items.iter().map(|v| self.scrub(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.scrub(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
