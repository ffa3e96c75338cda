//! Follow-up query suggestions derived from result columns.
//!
//! Rules are plain data checked in order; the first rule whose pattern matches
//! any column supplies all suggestions. New rules are added to [`RULES`].

/// Upper bound on suggestions attached to one message.
pub const MAX_SUGGESTIONS: usize = 3;

/// How a rule pattern is matched against a lowercased column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPattern {
    Contains(&'static str),
    Suffix(&'static str),
    Exact(&'static str),
}

impl ColumnPattern {
    fn matches(&self, column: &str) -> bool {
        match self {
            ColumnPattern::Contains(s) => column.contains(s),
            ColumnPattern::Suffix(s) => column.ends_with(s),
            ColumnPattern::Exact(s) => column == *s,
        }
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionRule {
    pub name: &'static str,
    pub patterns: &'static [ColumnPattern],
    pub suggestions: &'static [&'static str],
}

impl SuggestionRule {
    fn matches(&self, columns: &[String]) -> bool {
        columns.iter().any(|column| {
            let column = column.to_lowercase();
            self.patterns.iter().any(|p| p.matches(&column))
        })
    }
}

/// Rules in priority order.
pub const RULES: &[SuggestionRule] = &[
    SuggestionRule {
        name: "balance",
        patterns: &[ColumnPattern::Contains("balance")],
        suggestions: &[
            "Show traders with the highest account balance",
            "Show traders with the lowest account balance",
        ],
    },
    SuggestionRule {
        name: "date",
        patterns: &[
            ColumnPattern::Contains("date"),
            ColumnPattern::Contains("time"),
            ColumnPattern::Suffix("_at"),
        ],
        suggestions: &[
            "Show the most recent records",
            "Show records from the last 30 days",
        ],
    },
    SuggestionRule {
        name: "type",
        patterns: &[ColumnPattern::Contains("type")],
        suggestions: &[
            "Filter these results by type",
            "Count records for each type",
        ],
    },
    SuggestionRule {
        name: "frequency",
        patterns: &[
            ColumnPattern::Contains("trade_count"),
            ColumnPattern::Contains("num_trades"),
            ColumnPattern::Exact("trades"),
            ColumnPattern::Contains("interaction"),
        ],
        suggestions: &[
            "Who made the most trades?",
            "Who had the most interactions?",
        ],
    },
];

/// Suggestions used when no rule matches.
pub const DEFAULT_SUGGESTIONS: &[&str] = &["Show all traders", "List all brokers"];

/// Stateless engine over a rule table.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionEngine {
    rules: &'static [SuggestionRule],
    defaults: &'static [&'static str],
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionEngine {
    pub fn new() -> Self {
        Self {
            rules: RULES,
            defaults: DEFAULT_SUGGESTIONS,
        }
    }

    pub fn with_rules(
        rules: &'static [SuggestionRule],
        defaults: &'static [&'static str],
    ) -> Self {
        Self { rules, defaults }
    }

    /// Name of the first matching rule, if any.
    pub fn matched_rule(&self, columns: &[String]) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(columns))
            .map(|rule| rule.name)
    }

    pub fn suggest(&self, columns: &[String]) -> Vec<String> {
        let chosen = self
            .rules
            .iter()
            .find(|rule| rule.matches(columns))
            .map(|rule| rule.suggestions)
            .unwrap_or(self.defaults);
        chosen
            .iter()
            .take(MAX_SUGGESTIONS)
            .map(|s| s.to_string())
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
