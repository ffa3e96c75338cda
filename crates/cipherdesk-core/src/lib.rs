pub mod config;
pub mod error;
pub mod input;
pub mod redaction;
pub mod types;

pub use config::CipherdeskConfig;
pub use error::{CipherError, Result};
pub use input::InputBuffer;
pub use redaction::{RedactionFilter, PROTECTED_RENDERING, SENTINEL_MARKER};
pub use types::*;
