use thiserror::Error;

/// Top-level error type for the cipherdesk client.
///
/// Each variant names the subsystem that failed. Subsystem crates define their
/// own error types where they need richer variants and implement
/// `From<CipherError>` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CipherError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CipherError {
    fn from(err: toml::de::Error) -> Self {
        CipherError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CipherError {
    fn from(err: toml::ser::Error) -> Self {
        CipherError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CipherError {
    fn from(err: serde_json::Error) -> Self {
        CipherError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for cipherdesk operations.
pub type Result<T> = std::result::Result<T, CipherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CipherError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CipherError = io_err.into();
        assert!(matches!(err, CipherError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(CipherError, &str)> = vec![
            (
                CipherError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                CipherError::Transport("connection refused".to_string()),
                "Transport error: connection refused",
            ),
            (
                CipherError::Query("Only SELECT queries are allowed".to_string()),
                "Query error: Only SELECT queries are allowed",
            ),
            (
                CipherError::Voice("not supported".to_string()),
                "Voice error: not supported",
            ),
            (
                CipherError::Audio("device busy".to_string()),
                "Audio error: device busy",
            ),
            (
                CipherError::Transcription("empty audio".to_string()),
                "Transcription error: empty audio",
            ),
            (
                CipherError::Export("nothing to export".to_string()),
                "Export error: nothing to export",
            ),
            (
                CipherError::Serialization("eof".to_string()),
                "Serialization error: eof",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CipherError = json_err.into();
        assert!(matches!(err, CipherError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: CipherError = toml_err.into();
        assert!(matches!(err, CipherError::Config(_)));
    }

    #[test]
    fn test_result_alias_propagates() {
        fn inner() -> Result<u32> {
            Err(CipherError::Query("rejected".into()))
        }
        fn outer() -> Result<u32> {
            let v = inner()?;
            Ok(v + 1)
        }
        assert!(matches!(outer(), Err(CipherError::Query(_))));
    }
}
