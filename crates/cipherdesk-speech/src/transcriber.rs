//! Server-side transcription of captured audio.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cipherdesk_audio::encode_pcm16;
use cipherdesk_core::config::ServerConfig;
use cipherdesk_core::error::{CipherError, Result};

// =============================================================================
// Types
// =============================================================================

/// Mono audio captured during one listening episode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        cipherdesk_audio::pcm::duration_secs(self.samples.len(), self.sample_rate)
    }

    /// Base64 of the clip as 16-bit little-endian PCM.
    pub fn to_base64_pcm16(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(encode_pcm16(&self.samples))
    }
}

/// Request body of the transcription endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionRequest {
    pub audio_data: String,
    pub auto_send: bool,
}

/// Response body of the transcription endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response body of the speech status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SpeechStatus {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub encryption_enabled: bool,
}

// =============================================================================
// Trait
// =============================================================================

/// Collaborator turning a captured clip into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a clip. An empty transcript is reported as an error.
    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// Transcriber backed by the query server's speech endpoint.
#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    client: reqwest::Client,
    transcribe_url: String,
    status_url: String,
}

impl HttpTranscriber {
    /// Build a transcriber for the configured server.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.timeout_secs))
            .build()
            .map_err(|e| CipherError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, server))
    }

    pub fn with_client(client: reqwest::Client, server: &ServerConfig) -> Self {
        Self {
            client,
            transcribe_url: server.endpoint(&server.transcription_path),
            status_url: server.endpoint(&server.speech_status_path),
        }
    }

    /// Ask the server whether transcription is available.
    pub async fn status(&self) -> Result<SpeechStatus> {
        let response = self
            .client
            .get(&self.status_url)
            .send()
            .await
            .map_err(|e| CipherError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CipherError::Transport(format!(
                "Speech status returned HTTP {}",
                response.status()
            )));
        }
        response
            .json::<SpeechStatus>()
            .await
            .map_err(|e| CipherError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        if clip.is_empty() {
            return Err(CipherError::Transcription("No audio was captured".into()));
        }

        let request = TranscriptionRequest {
            audio_data: clip.to_base64_pcm16(),
            auto_send: false,
        };
        debug!(
            samples = clip.samples.len(),
            duration_secs = clip.duration_secs(),
            "Sending audio for transcription"
        );

        let response = self
            .client
            .post(&self.transcribe_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CipherError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CipherError::Transport(e.to_string()))?;
        let parsed: TranscriptionResponse = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() {
            let message = parsed
                .error
                .unwrap_or_else(|| format!("Transcription service returned HTTP {}", status));
            warn!(status = %status, "Transcription failed: {}", message);
            return Err(CipherError::Transcription(message));
        }

        if let Some(error) = parsed.error {
            return Err(CipherError::Transcription(error));
        }

        match parsed.transcript.map(|t| t.trim().to_string()) {
            Some(text) if !text.is_empty() => {
                info!(chars = text.len(), "Transcription received");
                Ok(text)
            }
            _ => Err(CipherError::Transcription("No speech detected".into())),
        }
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock transcriber returning a fixed outcome and recording what it saw.
#[derive(Debug)]
pub struct MockTranscriber {
    outcome: std::result::Result<String, String>,
    calls: AtomicUsize,
    last_clip: Mutex<Option<AudioClip>>,
}

impl MockTranscriber {
    fn with_outcome(outcome: std::result::Result<String, String>) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            last_clip: Mutex::new(None),
        }
    }

    pub fn returning(transcript: impl Into<String>) -> Self {
        Self::with_outcome(Ok(transcript.into()))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_outcome(Err(reason.into()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_clip(&self) -> Option<AudioClip> {
        self.last_clip.lock().ok().and_then(|c| c.clone())
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_clip.lock() {
            *last = Some(clip.clone());
        }
        match &self.outcome {
            Ok(text) if text.trim().is_empty() => {
                Err(CipherError::Transcription("No speech detected".into()))
            }
            Ok(text) => Ok(text.clone()),
            Err(reason) => Err(CipherError::Transcription(reason.clone())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
