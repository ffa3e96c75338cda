//! Error types for the chat session.

use cipherdesk_core::error::CipherError;
use uuid::Uuid;

/// Errors from session actions other than submit.
///
/// Submit failures never surface here; they become messages in the log.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("nothing to export")]
    NothingToExport,
    #[error("message not found: {0}")]
    MessageNotFound(Uuid),
    #[error("message {message_id} has no table {index}")]
    TableNotFound { message_id: Uuid, index: usize },
    #[error("no result table to act on")]
    NoTable,
    #[error("export error: {0}")]
    Export(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("session state error: {0}")]
    State(String),
}

impl From<CipherError> for ChatError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::Transport(msg) => ChatError::Transport(msg),
            CipherError::Export(msg) => ChatError::Export(msg),
            CipherError::Io(e) => ChatError::Export(e.to_string()),
            other => ChatError::State(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Export(err.to_string())
    }
}
