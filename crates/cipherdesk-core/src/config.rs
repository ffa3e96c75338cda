use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CipherError, Result};
use crate::types::Mode;

/// Top-level configuration for the cipherdesk client.
///
/// Loaded from `~/.cipherdesk/config.toml` by default. Every section falls
/// back to its defaults when absent, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CipherdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl CipherdeskConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CipherdeskConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CipherError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory that receives exported CSV files.
    pub export_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            export_dir: ".".to_string(),
        }
    }
}

/// Location of the query server and its endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the query server, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Conversational query endpoint.
    pub chat_path: String,
    /// Raw (read-only) query endpoint.
    pub raw_query_path: String,
    /// JSON field carrying the query text in a raw-query request.
    pub raw_query_field: String,
    /// Speech transcription endpoint.
    pub transcription_path: String,
    /// Health check endpoint.
    pub health_path: String,
    /// Speech service availability endpoint.
    pub speech_status_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 30,
            chat_path: "/api/chat".to_string(),
            raw_query_path: "/api/execute_sql".to_string(),
            raw_query_field: "sql".to_string(),
            transcription_path: "/api/speech_recognition".to_string(),
            health_path: "/api/health".to_string(),
            speech_status_path: "/api/speech_status".to_string(),
        }
    }
}

impl ServerConfig {
    /// Join the base URL with an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Result presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Rows per result page.
    pub page_size: usize,
    /// Input mode active when a session starts.
    pub start_mode: Mode,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            start_mode: Mode::Conversational,
        }
    }
}

/// Where recognized speech becomes authoritative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceProcessing {
    /// The live recognizer's final transcript is submitted.
    Local,
    /// Captured audio is sent to the transcription endpoint on stop.
    #[default]
    Server,
}

/// Voice capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Whether voice input is offered at all.
    pub enabled: bool,
    /// Which transcript path submits.
    pub processing: VoiceProcessing,
    /// Keyboard chord that toggles capture.
    pub shortcut: String,
    /// Delay between a final live transcript and the submit, in milliseconds.
    pub settle_delay_ms: u64,
    /// Maximum length of one listening episode in seconds.
    pub max_duration_secs: u32,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            processing: VoiceProcessing::Server,
            shortcut: "Alt+V".to_string(),
            settle_delay_ms: 500,
            max_duration_secs: 60,
            sample_rate: 16000,
        }
    }
}
