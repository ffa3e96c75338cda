//! cipherdesk binary - composition root.
//!
//! 1. Load configuration from TOML and fold in CLI flags
//! 2. Build the HTTP query and transcription collaborators
//! 3. Wire the voice bridge's submit callback into the REPL
//! 4. Run the interactive loop

mod cli;
mod render;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use cipherdesk_audio::MicrophoneDevice;
use cipherdesk_chat::{HttpBackend, SessionController};
use cipherdesk_core::config::CipherdeskConfig;
use cipherdesk_core::InputBuffer;
use cipherdesk_speech::{HttpTranscriber, UnsupportedRecognizer};
use cipherdesk_voice::{Chord, EventFn, SubmitFn, VoiceCaptureBridge, VoiceCollaborators};

use cli::CliArgs;
use repl::{describe_voice_event, Repl};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = CipherdeskConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing. Logs go to stderr so they stay out of the chat transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting cipherdesk v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %config_file.display(),
        server = %config.server.base_url,
        "Configuration loaded"
    );

    // Query collaborator and session.
    let input = InputBuffer::new();
    let backend = Arc::new(HttpBackend::new(&config.server)?);
    let session = Arc::new(SessionController::new(
        backend,
        input.clone(),
        &config.display,
    ));

    // Speech.
    let transcriber = HttpTranscriber::new(&config.server)?;
    if config.voice.enabled {
        match transcriber.status().await {
            Ok(status) => tracing::info!(
                available = status.available,
                encryption_enabled = status.encryption_enabled,
                "Speech service status"
            ),
            Err(e) => tracing::warn!(error = %e, "Speech service status unavailable"),
        }
    }

    let chord = config.voice.shortcut.parse::<Chord>().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to the default voice shortcut");
        Chord::default()
    });

    // Dictated text reaches the session through the REPL so submits stay
    // ordered with typed input.
    let (dictated_tx, dictated_rx) = mpsc::unbounded_channel();
    let submit: SubmitFn = Arc::new(move |text: String| {
        if dictated_tx.send(text).is_err() {
            tracing::debug!("Dictated text dropped after the REPL closed");
        }
    });
    let events: EventFn = Arc::new(|event| println!("{}", describe_voice_event(&event)));

    let voice = VoiceCaptureBridge::new(
        config.voice.clone(),
        VoiceCollaborators {
            recognizer: Arc::new(UnsupportedRecognizer),
            device: Arc::new(MicrophoneDevice::new()),
            transcriber: Arc::new(transcriber),
        },
        input,
        submit,
        events,
    );

    let export_dir = PathBuf::from(&config.general.export_dir);
    let mut repl = Repl::new(session, voice, dictated_rx, chord, export_dir);
    repl.run().await
}
