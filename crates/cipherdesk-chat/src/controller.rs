//! Session controller: input mode, single-flight dispatch and the message log.
//!
//! All methods take `&self`. State sits behind a mutex that is never held
//! across an `.await`, so the controller can be shared between the input loop
//! and the voice bridge's submit callback.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cipherdesk_core::config::DisplayConfig;
use cipherdesk_core::types::{Message, Mode, Record};
use cipherdesk_core::{InputBuffer, RedactionFilter};

use crate::backend::QueryBackend;
use crate::error::ChatError;
use crate::export::ExportEncoder;
use crate::fragment::{build_fragment, Fragment};
use crate::log::MessageLog;
use crate::pagination::PageAction;
use crate::suggestions::SuggestionEngine;
use crate::wire::{ChatResponse, HealthStatus};

/// Appended whenever a request fails before the server could answer.
pub const APOLOGY: &str = "Sorry, I couldn't reach the database assistant. Please try again.";

/// Appended the first time raw-query mode is switched on.
pub const RAW_QUERY_NOTICE: &str =
    "Raw query mode is on. Only read-only SELECT queries are allowed; anything else is rejected.";

/// Request phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingResponse,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::AwaitingResponse => write!(f, "AwaitingResponse"),
        }
    }
}

/// Why a submit produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    Empty,
    Busy,
}

/// What a call to [`SessionController::submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored(IgnoredReason),
    /// An assistant answer was appended.
    Answered(Uuid),
    /// The server reported an error, shown as an error block.
    UpstreamError(Uuid),
    /// The exchange failed; the apology was appended.
    Apologized(Uuid),
    /// The session was cleared while the request was in flight.
    Discarded,
}

#[derive(Debug)]
struct SessionState {
    phase: Phase,
    mode: Mode,
    log: MessageLog,
    raw_notice_shown: bool,
    /// Bumped by `clear` so late responses can be recognised.
    epoch: u64,
}

pub struct SessionController {
    session_id: Uuid,
    backend: Arc<dyn QueryBackend>,
    input: InputBuffer,
    state: Mutex<SessionState>,
    suggestions: SuggestionEngine,
    filter: RedactionFilter,
    exporter: ExportEncoder,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        input: InputBuffer,
        display_config: &DisplayConfig,
    ) -> Self {
        let filter = RedactionFilter::new();
        let session_id = Uuid::new_v4();
        let start_mode = display_config.start_mode;
        info!(session_id = %session_id, mode = %start_mode, "Session started");
        Self {
            session_id,
            backend,
            input,
            state: Mutex::new(SessionState {
                phase: Phase::Idle,
                mode: start_mode,
                log: MessageLog::new(display_config.page_size),
                raw_notice_shown: false,
                epoch: 0,
            }),
            suggestions: SuggestionEngine::new(),
            filter,
            exporter: ExportEncoder::new(filter),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, SessionState>, ChatError> {
        self.state
            .lock()
            .map_err(|e| ChatError::State(format!("session lock poisoned: {}", e)))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    pub fn phase(&self) -> Result<Phase, ChatError> {
        Ok(self.state()?.phase)
    }

    pub fn mode(&self) -> Result<Mode, ChatError> {
        Ok(self.state()?.mode)
    }

    // =========================================================================
    // Submit
    // =========================================================================

    /// Submit one query.
    ///
    /// Blank text, or text arriving while a request is in flight, is ignored.
    /// Otherwise the user message is appended, the input is cleared and
    /// exactly one request goes to the collaborator for the active mode.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, ChatError> {
        let query = text.trim();
        if query.is_empty() {
            return Ok(SubmitOutcome::Ignored(IgnoredReason::Empty));
        }

        let (mode, epoch) = {
            let mut state = self.state()?;
            if state.phase != Phase::Idle {
                debug!(session_id = %self.session_id, "Submit ignored while awaiting a response");
                return Ok(SubmitOutcome::Ignored(IgnoredReason::Busy));
            }
            state.log.append(Message::user(query));
            state.phase = Phase::AwaitingResponse;
            (state.mode, state.epoch)
        };
        self.input.clear();
        info!(session_id = %self.session_id, mode = %mode, "Dispatching query");

        let result = match mode {
            Mode::Conversational => self
                .backend
                .converse(query)
                .await
                .map(|response| self.conversational_message(&response)),
            Mode::RawQuery => self
                .backend
                .raw_query(query)
                .await
                .map(|response| self.with_local_suggestions(response.to_message())),
        };

        let mut state = self.state()?;
        if state.epoch != epoch {
            debug!(session_id = %self.session_id, "Dropping response for a cleared session");
            state.phase = Phase::Idle;
            return Ok(SubmitOutcome::Discarded);
        }
        let outcome = match result {
            Ok(message) => {
                let upstream_error = message.error.is_some();
                let tables = message.results.len();
                let id = state.log.append(message);
                if upstream_error {
                    warn!(session_id = %self.session_id, "Query rejected by the server");
                    SubmitOutcome::UpstreamError(id)
                } else {
                    info!(session_id = %self.session_id, tables, "Answer received");
                    SubmitOutcome::Answered(id)
                }
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Query failed");
                SubmitOutcome::Apologized(state.log.append(Message::assistant(APOLOGY)))
            }
        };
        state.phase = Phase::Idle;
        Ok(outcome)
    }

    fn conversational_message(&self, response: &ChatResponse) -> Message {
        if let Some(metadata) = &response.metadata {
            for line in &metadata.he_tripwire {
                debug!(session_id = %self.session_id, tripwire = %line, "Encryption tripwire");
            }
        }
        let message = response.to_message();
        match response.suggestions.as_ref().filter(|s| !s.is_empty()) {
            Some(upstream) if message.error.is_none() => {
                message.with_suggestions(upstream.clone())
            }
            _ => self.with_local_suggestions(message),
        }
    }

    /// Attach rule-based suggestions when the answer carries rows.
    fn with_local_suggestions(&self, message: Message) -> Message {
        if message.error.is_some() {
            return message;
        }
        let columns = message
            .results
            .iter()
            .rev()
            .find(|set| !set.is_empty())
            .map(|set| set.columns.clone());
        match columns {
            Some(columns) => {
                let suggestions = self.suggestions.suggest(&columns);
                message.with_suggestions(suggestions)
            }
            None => message,
        }
    }

    // =========================================================================
    // Mode and session
    // =========================================================================

    /// Switch the input mode. Allowed in any phase; an in-flight request keeps
    /// the mode it was sent with.
    ///
    /// Returns the id of the informational message appended the first time
    /// raw-query mode is entered.
    pub fn set_mode(&self, mode: Mode) -> Result<Option<Uuid>, ChatError> {
        let mut state = self.state()?;
        if state.mode == mode {
            return Ok(None);
        }
        state.mode = mode;
        info!(session_id = %self.session_id, mode = %mode, "Mode changed");
        if mode == Mode::RawQuery && !state.raw_notice_shown {
            state.raw_notice_shown = true;
            return Ok(Some(state.log.append(Message::assistant(RAW_QUERY_NOTICE))));
        }
        Ok(None)
    }

    pub fn toggle_mode(&self) -> Result<Mode, ChatError> {
        let next = self.mode()?.toggled();
        self.set_mode(next)?;
        Ok(next)
    }

    /// Reset the log to the greeting. A request still in flight is not
    /// cancelled: the session stays busy until it completes, and its response
    /// is then dropped.
    pub fn clear(&self) -> Result<(), ChatError> {
        let mut state = self.state()?;
        state.epoch += 1;
        state.log.reset();
        state.raw_notice_shown = false;
        drop(state);
        self.input.clear();
        info!(session_id = %self.session_id, "Session cleared");
        Ok(())
    }

    // =========================================================================
    // Tables
    // =========================================================================

    pub fn page(
        &self,
        message_id: Uuid,
        table: usize,
        action: PageAction,
    ) -> Result<bool, ChatError> {
        self.state()?.log.page(message_id, table, action)
    }

    /// Page the most recent table in the log.
    pub fn page_latest(&self, action: PageAction) -> Result<(Uuid, bool), ChatError> {
        let mut state = self.state()?;
        let (id, index) = state.log.latest_table().ok_or(ChatError::NoTable)?;
        let changed = state.log.page(id, index, action)?;
        Ok((id, changed))
    }

    /// Write one table to `dir` as CSV and return the file path.
    pub fn export(&self, message_id: Uuid, table: usize, dir: &Path) -> Result<PathBuf, ChatError> {
        let records: Vec<Record> = self.state()?.log.result_set(message_id, table)?.rows.clone();
        self.exporter.write_to(&records, dir, Local::now())
    }

    pub fn export_latest(&self, dir: &Path) -> Result<PathBuf, ChatError> {
        let (id, index) = self
            .state()?
            .log
            .latest_table()
            .ok_or(ChatError::NothingToExport)?;
        self.export(id, index, dir)
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn message_count(&self) -> Result<usize, ChatError> {
        Ok(self.state()?.log.len())
    }

    pub fn messages(&self) -> Result<Vec<Message>, ChatError> {
        Ok(self.state()?.log.messages().cloned().collect())
    }

    pub fn fragment(&self, message_id: Uuid) -> Result<Fragment, ChatError> {
        let state = self.state()?;
        let entry = state
            .log
            .get(message_id)
            .ok_or(ChatError::MessageNotFound(message_id))?;
        Ok(build_fragment(entry, &self.filter))
    }

    /// Fragments for every message from position `start` on.
    pub fn fragments_since(&self, start: usize) -> Result<Vec<Fragment>, ChatError> {
        let state = self.state()?;
        Ok(state
            .log
            .entries()
            .iter()
            .skip(start)
            .map(|entry| build_fragment(entry, &self.filter))
            .collect())
    }

    pub async fn health(&self) -> Result<HealthStatus, ChatError> {
        Ok(self.backend.health().await?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::wire::RawQueryResponse;
    use cipherdesk_core::types::Role;
    use serde_json::json;

    fn controller(backend: MockBackend) -> SessionController {
        SessionController::new(
            Arc::new(backend),
            InputBuffer::new(),
            &DisplayConfig::default(),
        )
    }

    fn chat(value: serde_json::Value) -> ChatResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_new_session_starts_in_configured_mode() {
        let display_config = DisplayConfig {
            page_size: 25,
            start_mode: Mode::RawQuery,
        };
        let session = SessionController::new(
            Arc::new(MockBackend::new()),
            InputBuffer::new(),
            &display_config,
        );
        assert_eq!(session.mode().unwrap(), Mode::RawQuery);
        assert_eq!(session.phase().unwrap(), Phase::Idle);
        assert_eq!(session.message_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blank_submit_is_ignored() {
        let session = controller(MockBackend::new());
        let outcome = session.submit("   \n").await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Ignored(IgnoredReason::Empty));
        assert_eq!(session.message_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_assistant() {
        let session = controller(MockBackend::new().with_chat(chat(json!({
            "response": "Here's what I found:",
            "data": [{"name": "Ada"}]
        }))));
        session.input().set("who is here");
        let outcome = session.submit("who is here").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Answered(_)));

        let messages = session.messages().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].text, "who is here");
        assert_eq!(messages[2].role, Role::Assistant);
        assert!(session.input().is_empty());
        assert_eq!(session.phase().unwrap(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_upstream_suggestions_win() {
        let session = controller(MockBackend::new().with_chat(chat(json!({
            "data": [{"account_balance": 10}],
            "suggestions": ["Ask something else"]
        }))));
        session.submit("balances").await.unwrap();
        let last = session.messages().unwrap().pop().unwrap();
        assert_eq!(last.suggestions, Some(vec!["Ask something else".to_string()]));
    }

    #[tokio::test]
    async fn test_local_suggestions_need_rows() {
        let session = controller(MockBackend::new().with_chat(chat(json!({
            "response": "Nothing matched."
        }))));
        session.submit("anything").await.unwrap();
        let last = session.messages().unwrap().pop().unwrap();
        assert!(last.suggestions.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_apologizes() {
        let session = controller(MockBackend::new().unreachable("refused"));
        let outcome = session.submit("hello").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Apologized(_)));
        let last = session.messages().unwrap().pop().unwrap();
        assert_eq!(last.text, APOLOGY);
        assert_eq!(session.phase().unwrap(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_raw_notice_once() {
        let session = controller(MockBackend::new());
        assert!(session.set_mode(Mode::RawQuery).unwrap().is_some());
        session.set_mode(Mode::Conversational).unwrap();
        assert!(session.set_mode(Mode::RawQuery).unwrap().is_none());
        assert_eq!(session.message_count().unwrap(), 2);
        assert_eq!(session.toggle_mode().unwrap(), Mode::Conversational);
    }

    #[tokio::test]
    async fn test_raw_mode_routes_to_raw_endpoint() {
        let backend = Arc::new(MockBackend::new().with_raw(RawQueryResponse {
            results: Some(vec![json!({"trader_id": 1}).as_object().cloned().unwrap()]),
            ..RawQueryResponse::default()
        }));
        let session = SessionController::new(
            backend.clone(),
            InputBuffer::new(),
            &DisplayConfig::default(),
        );
        session.set_mode(Mode::RawQuery).unwrap();
        session.submit("SELECT trader_id FROM traders").await.unwrap();
        assert_eq!(backend.requests(), vec!["SELECT trader_id FROM traders"]);
    }

    #[tokio::test]
    async fn test_page_and_export_without_tables() {
        let session = controller(MockBackend::new());
        assert!(matches!(
            session.page_latest(PageAction::Next),
            Err(ChatError::NoTable)
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            session.export_latest(dir.path()),
            Err(ChatError::NothingToExport)
        ));
    }
}
