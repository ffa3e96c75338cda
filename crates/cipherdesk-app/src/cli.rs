//! CLI argument definitions for the cipherdesk client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use cipherdesk_core::config::CipherdeskConfig;
use cipherdesk_core::types::Mode;

/// cipherdesk: chat with the secure financial database from the terminal.
#[derive(Parser, Debug)]
#[command(name = "cipherdesk", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the query server.
    #[arg(short = 's', long = "server")]
    pub server: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Start in raw-query mode.
    #[arg(long = "raw")]
    pub raw: bool,

    /// Disable voice input.
    #[arg(long = "no-voice")]
    pub no_voice: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CIPHERDESK_CONFIG env var > ~/.cipherdesk/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CIPHERDESK_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the server base URL.
    ///
    /// Priority: --server flag > CIPHERDESK_SERVER env var > config file value.
    pub fn resolve_server(&self, config_url: &str) -> String {
        self.server
            .clone()
            .or_else(|| std::env::var("CIPHERDESK_SERVER").ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| config_url.to_string())
    }

    /// Fold the command line into a loaded configuration.
    pub fn apply(&self, config: &mut CipherdeskConfig) {
        config.server.base_url = self.resolve_server(&config.server.base_url);
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if self.raw {
            config.display.start_mode = Mode::RawQuery;
        }
        if self.no_voice {
            config.voice.enabled = false;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".cipherdesk").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".cipherdesk").join("config.toml");
    }
    PathBuf::from("config.toml")
}
