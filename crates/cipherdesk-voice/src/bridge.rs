//! Voice capture bridge managing one listening episode at a time.
//!
//! The bridge owns the capture state, the audio device for the duration of an
//! episode, and the pump task that moves recognizer events into the shared
//! input buffer. Exactly one transcript path is authoritative per
//! configuration:
//!
//! - `Local`: the recognizer's final transcript is submitted after a settle
//!   delay, or at once if the user stops during that delay.
//! - `Server`: audio is captured while listening; on stop the clip goes to the
//!   transcription collaborator and its transcript is submitted. Recognizer
//!   events only preview text in the input.
//!
//! Either way the submit callback runs at most once per episode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cipherdesk_audio::{AudioDevice, AudioStream};
use cipherdesk_core::config::{VoiceConfig, VoiceProcessing};
use cipherdesk_core::error::{CipherError, Result};
use cipherdesk_core::input::InputBuffer;
use cipherdesk_speech::{AudioClip, RecognitionEvent, SpeechRecognizer, Transcriber};

/// How often the pump checks the audio stream for capture errors.
const DEVICE_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Callback that submits text through the session's normal input pipeline.
pub type SubmitFn = Arc<dyn Fn(String) + Send + Sync>;

/// Callback receiving progress and notices for display.
pub type EventFn = Arc<dyn Fn(VoiceEvent) + Send + Sync>;

/// Whether an episode is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    Idle,
    /// Capturing speech; live transcripts flow into the input.
    Listening,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Listening => write!(f, "Listening"),
        }
    }
}

/// Observable progress of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// An episode started.
    Listening,
    /// Live transcript now in the input.
    Transcript(String),
    /// Captured audio was handed to the transcription collaborator.
    Transcribing,
    /// Text was passed to the submit callback.
    Submitted(String),
    /// The episode ended without a submit.
    Stopped,
    /// Non-fatal problem to show the user.
    Notice(String),
}

/// Collaborators the bridge drives.
#[derive(Clone)]
pub struct VoiceCollaborators {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub device: Arc<dyn AudioDevice>,
    pub transcriber: Arc<dyn Transcriber>,
}

struct Episode {
    id: Uuid,
    stream: Option<Box<dyn AudioStream>>,
    pump: Option<JoinHandle<()>>,
    /// Final transcript waiting out the settle delay.
    pending_final: Option<String>,
}

impl Episode {
    fn release_device(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            debug!(episode_id = %self.id, "Audio device released");
        }
    }
}

struct Inner {
    config: VoiceConfig,
    /// Set from start until the episode ends; at most one episode at a time.
    listening: AtomicBool,
    collaborators: VoiceCollaborators,
    input: InputBuffer,
    submit: SubmitFn,
    events: EventFn,
    episode: Mutex<Option<Episode>>,
    /// Set once the current episode has submitted; cleared on start.
    submitted: AtomicBool,
}

/// Bridges speech capture into the session's input pipeline.
///
/// Cheap to clone; clones drive the same bridge.
#[derive(Clone)]
pub struct VoiceCaptureBridge {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for VoiceCaptureBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceCaptureBridge")
            .field("state", &self.state())
            .field("processing", &self.inner.config.processing)
            .finish()
    }
}

impl VoiceCaptureBridge {
    /// Create a bridge. `submit` is called with each dictated query.
    pub fn new(
        config: VoiceConfig,
        collaborators: VoiceCollaborators,
        input: InputBuffer,
        submit: SubmitFn,
        events: EventFn,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                listening: AtomicBool::new(false),
                collaborators,
                input,
                submit,
                events,
                episode: Mutex::new(None),
                submitted: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> CaptureState {
        if self.inner.listening.load(Ordering::SeqCst) {
            CaptureState::Listening
        } else {
            CaptureState::Idle
        }
    }

    pub fn is_listening(&self) -> bool {
        self.state() == CaptureState::Listening
    }

    /// Whether capture can start with the configured processing path.
    pub fn is_supported(&self) -> bool {
        let inner = &self.inner;
        inner.config.enabled
            && match inner.config.processing {
                VoiceProcessing::Local => inner.collaborators.recognizer.is_supported(),
                VoiceProcessing::Server => inner.collaborators.device.is_available(),
            }
    }

    /// Start listening.
    ///
    /// Without capture support this reports a notice and returns an error while
    /// the state stays `Idle`. Starting while already listening is a no-op.
    pub async fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if !self.is_supported() {
            let message = if inner.config.enabled {
                "Speech recognition is not supported in this environment"
            } else {
                "Voice input is disabled"
            };
            inner.emit(VoiceEvent::Notice(message.to_string()));
            return Err(CipherError::Voice(message.to_string()));
        }

        if inner
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Voice start ignored: already listening");
            return Ok(());
        }
        inner.submitted.store(false, Ordering::SeqCst);
        let id = Uuid::new_v4();

        let stream = match inner.config.processing {
            VoiceProcessing::Server => match inner
                .collaborators
                .device
                .acquire(inner.config.sample_rate, inner.config.max_duration_secs)
                .await
            {
                Ok(stream) => Some(stream),
                Err(e) => {
                    inner.set_idle();
                    let message = format!("Could not access the microphone: {}", e);
                    inner.emit(VoiceEvent::Notice(message.clone()));
                    return Err(CipherError::Audio(message));
                }
            },
            VoiceProcessing::Local => None,
        };

        let events = match self.start_recognizer().await {
            Ok(rx) => rx,
            Err(e) => {
                if let Some(mut stream) = stream {
                    stream.release();
                }
                inner.set_idle();
                let message = format!("Speech recognition failed to start: {}", e);
                inner.emit(VoiceEvent::Notice(message.clone()));
                return Err(CipherError::Voice(message));
            }
        };

        {
            let mut slot = inner.lock_episode();
            *slot = Some(Episode {
                id,
                stream,
                pump: None,
                pending_final: None,
            });
        }

        info!(
            episode_id = %id,
            processing = ?inner.config.processing,
            "Voice capture started"
        );
        inner.emit(VoiceEvent::Listening);

        let pump = tokio::spawn(Arc::clone(&self.inner).pump(id, events));
        if let Some(episode) = inner.lock_episode().as_mut().filter(|e| e.id == id) {
            episode.pump = Some(pump);
        }
        Ok(())
    }

    /// Stop listening. A no-op while `Idle`.
    ///
    /// In server mode this awaits the transcription of the captured clip.
    pub async fn stop(&self) {
        let Some(mut episode) = self.inner.take_episode(None) else {
            debug!("Voice stop ignored: no active episode");
            return;
        };
        if let Some(pump) = episode.pump.take() {
            pump.abort();
        }
        Arc::clone(&self.inner).finish(episode).await;
    }

    /// Start when idle, stop when listening.
    pub async fn toggle(&self) -> Result<()> {
        if self.is_listening() {
            self.stop().await;
            Ok(())
        } else {
            self.start().await
        }
    }

    async fn start_recognizer(&self) -> Result<mpsc::UnboundedReceiver<RecognitionEvent>> {
        let inner = &self.inner;
        let recognizer = &inner.collaborators.recognizer;
        match inner.config.processing {
            VoiceProcessing::Local => recognizer.start().await,
            VoiceProcessing::Server if recognizer.is_supported() => {
                match recognizer.start().await {
                    Ok(rx) => Ok(rx),
                    Err(e) => {
                        warn!(error = %e, "Live preview unavailable, capturing audio only");
                        Ok(mpsc::unbounded_channel().1)
                    }
                }
            }
            VoiceProcessing::Server => Ok(mpsc::unbounded_channel().1),
        }
    }
}

impl Inner {
    /// Return to `Idle`.
    fn set_idle(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!("Capture state: Listening -> Idle");
        }
    }

    fn emit(&self, event: VoiceEvent) {
        (self.events)(event);
    }

    fn lock_episode(&self) -> MutexGuard<'_, Option<Episode>> {
        self.episode.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the active episode, optionally only if it is `id`.
    fn take_episode(&self, id: Option<Uuid>) -> Option<Episode> {
        let mut slot = self.lock_episode();
        match (slot.as_ref(), id) {
            (Some(current), Some(id)) if current.id != id => None,
            _ => slot.take(),
        }
    }

    /// Hand `text` to the submit callback unless this episode already did.
    fn submit_once(&self, text: String) {
        if self.submitted.swap(true, Ordering::SeqCst) {
            debug!("Duplicate voice submit suppressed");
            return;
        }
        self.input.set(text.clone());
        (self.submit)(text.clone());
        self.emit(VoiceEvent::Submitted(text));
    }

    /// End an episode that has been taken out of the slot.
    async fn finish(self: Arc<Self>, mut episode: Episode) {
        self.collaborators.recognizer.stop();

        match self.config.processing {
            VoiceProcessing::Local => {
                episode.release_device();
                match episode.pending_final.take() {
                    Some(text) => {
                        info!(episode_id = %episode.id, "Final transcript submitted on stop");
                        self.submit_once(text);
                    }
                    None => {
                        info!(episode_id = %episode.id, "Voice capture stopped");
                        self.emit(VoiceEvent::Stopped);
                    }
                }
                self.set_idle();
            }
            VoiceProcessing::Server => {
                let clip = match episode.stream.as_mut() {
                    Some(stream) => AudioClip::new(stream.take_samples(), stream.sample_rate()),
                    None => AudioClip::default(),
                };
                episode.release_device();

                info!(
                    episode_id = %episode.id,
                    duration_secs = clip.duration_secs(),
                    "Voice capture stopped, transcribing"
                );
                self.emit(VoiceEvent::Transcribing);
                let result = self.collaborators.transcriber.transcribe(&clip).await;

                // Still Listening here, so no new episode can reset the submit flag.
                match result {
                    Ok(text) => self.submit_once(text),
                    Err(e) => {
                        warn!(episode_id = %episode.id, error = %e, "Transcription failed");
                        self.emit(VoiceEvent::Notice(format!("Transcription failed: {}", e)));
                    }
                }
                self.set_idle();
            }
        }
    }

    /// Abort an episode after a capture error.
    fn fail(&self, id: Uuid, reason: String) {
        if let Some(mut episode) = self.take_episode(Some(id)) {
            episode.pump.take();
            episode.release_device();
            self.collaborators.recognizer.stop();
            self.set_idle();
            warn!(episode_id = %id, "Voice capture failed: {}", reason);
            self.emit(VoiceEvent::Notice(format!("Voice capture error: {}", reason)));
        }
    }

    /// Capture error reported by the stream of episode `id`, if any.
    fn device_error(&self, id: Uuid) -> Option<String> {
        self.lock_episode()
            .as_mut()
            .filter(|e| e.id == id)?
            .stream
            .as_mut()?
            .take_error()
    }

    /// Move recognizer events into the input until the episode ends.
    async fn pump(self: Arc<Self>, id: Uuid, mut events: mpsc::UnboundedReceiver<RecognitionEvent>) {
        let limit = tokio::time::sleep(Duration::from_secs(
            self.config.max_duration_secs.max(1) as u64,
        ));
        tokio::pin!(limit);
        let mut open = true;
        let watch_device = self.config.processing == VoiceProcessing::Server;
        let mut device_check = tokio::time::interval(DEVICE_CHECK_INTERVAL);
        device_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                _ = &mut limit => {
                    debug!(episode_id = %id, "Maximum listening duration reached");
                    if let Some(mut episode) = self.take_episode(Some(id)) {
                        episode.pump.take();
                        Arc::clone(&self).finish(episode).await;
                    }
                    return;
                }
                _ = device_check.tick(), if watch_device => {
                    if let Some(reason) = self.device_error(id) {
                        self.fail(id, reason);
                        return;
                    }
                    continue;
                }
                event = events.recv(), if open => event,
            };

            let local = self.config.processing == VoiceProcessing::Local;
            match event {
                Some(RecognitionEvent::Interim(text)) => {
                    self.input.set(text.clone());
                    self.emit(VoiceEvent::Transcript(text));
                }
                Some(RecognitionEvent::Final(text)) => {
                    let settle = local && !text.trim().is_empty();
                    if settle {
                        if let Some(episode) = self.lock_episode().as_mut().filter(|e| e.id == id) {
                            episode.pending_final = Some(text.clone());
                        }
                    }
                    self.input.set(text.clone());
                    self.emit(VoiceEvent::Transcript(text.clone()));
                    if settle {
                        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms))
                            .await;
                        if let Some(mut episode) = self.take_episode(Some(id)) {
                            episode.pump.take();
                            episode.release_device();
                            self.collaborators.recognizer.stop();
                            info!(episode_id = %id, "Final transcript submitted");
                            self.submit_once(text);
                            self.set_idle();
                        }
                        return;
                    }
                }
                Some(RecognitionEvent::Error(reason)) if local => {
                    self.fail(id, reason);
                    return;
                }
                Some(RecognitionEvent::Error(reason)) => {
                    warn!(episode_id = %id, "Live preview error: {}", reason);
                    open = false;
                }
                Some(RecognitionEvent::End) | None if local => {
                    if let Some(mut episode) = self.take_episode(Some(id)) {
                        episode.pump.take();
                        Arc::clone(&self).finish(episode).await;
                    }
                    return;
                }
                Some(RecognitionEvent::End) | None => {
                    // Audio capture continues until stop or the duration limit.
                    open = false;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
