//! Chat session for the financial database assistant.
//!
//! Owns the session state machine, the message log with paged result tables,
//! follow-up suggestions, CSV export and the HTTP query collaborators.

pub mod backend;
pub mod controller;
pub mod error;
pub mod export;
pub mod fragment;
pub mod log;
pub mod pagination;
pub mod suggestions;
pub mod table;
pub mod wire;

pub use backend::{HttpBackend, MockBackend, QueryBackend};
pub use controller::{IgnoredReason, Phase, SessionController, SubmitOutcome, APOLOGY};
pub use error::ChatError;
pub use export::ExportEncoder;
pub use fragment::{build_fragment, Fragment, PageControls, TableFragment};
pub use log::{LogEntry, MessageLog, GREETING};
pub use pagination::{PageAction, Pagination};
pub use suggestions::SuggestionEngine;
pub use table::ResultTable;
pub use wire::{ChatResponse, HealthStatus, RawQueryResponse};
