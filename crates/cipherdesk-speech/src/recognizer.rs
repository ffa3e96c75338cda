//! Live speech recognition producing interim and final transcripts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use cipherdesk_core::error::{CipherError, Result};

/// One event from a running recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Partial transcript that may still change.
    Interim(String),
    /// Settled transcript for the utterance.
    Final(String),
    /// Recognition failed; the episode is over.
    Error(String),
    /// The recognizer stopped on its own or after `stop`.
    End,
}

/// A live recognizer.
///
/// `start` returns a channel of events for one episode. The channel yields
/// `End` (or `Error`) last and then closes.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether live recognition is possible on this host.
    fn is_supported(&self) -> bool;

    async fn start(&self) -> Result<mpsc::UnboundedReceiver<RecognitionEvent>>;

    /// Ask the current episode to finish. No-op when nothing is running.
    fn stop(&self);
}

// =============================================================================
// Unsupported
// =============================================================================

/// Recognizer for hosts without live speech recognition.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedRecognizer;

#[async_trait]
impl SpeechRecognizer for UnsupportedRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    async fn start(&self) -> Result<mpsc::UnboundedReceiver<RecognitionEvent>> {
        Err(CipherError::Voice(
            "Speech recognition is not supported".into(),
        ))
    }

    fn stop(&self) {}
}

// =============================================================================
// Scripted (mock) recognizer
// =============================================================================

/// One scripted event and the delay before it is emitted.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub delay: Duration,
    pub event: RecognitionEvent,
}

impl ScriptStep {
    pub fn new(delay_ms: u64, event: RecognitionEvent) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            event,
        }
    }
}

#[derive(Debug, Default)]
struct Episode {
    stopped: AtomicBool,
    wake: Notify,
}

/// Recognizer that replays a fixed script of events.
///
/// Used for testing and demos. `stop` ends the replay early and emits `End`.
#[derive(Debug, Default)]
pub struct ScriptedRecognizer {
    script: Vec<ScriptStep>,
    current: Mutex<Option<Arc<Episode>>>,
    starts: AtomicUsize,
    start_error: Option<String>,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Interim words followed by a final transcript, 10ms apart.
    pub fn utterance(interims: &[&str], final_text: &str) -> Self {
        let mut script: Vec<ScriptStep> = interims
            .iter()
            .map(|t| ScriptStep::new(10, RecognitionEvent::Interim(t.to_string())))
            .collect();
        script.push(ScriptStep::new(
            10,
            RecognitionEvent::Final(final_text.to_string()),
        ));
        Self::new(script)
    }

    /// A recognizer whose `start` fails, e.g. permission denied.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            start_error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    fn is_supported(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<mpsc::UnboundedReceiver<RecognitionEvent>> {
        if let Some(reason) = &self.start_error {
            return Err(CipherError::Voice(reason.clone()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);

        let episode = Arc::new(Episode::default());
        if let Ok(mut current) = self.current.lock() {
            *current = Some(Arc::clone(&episode));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let script = self.script.clone();
        tokio::spawn(async move {
            for step in script {
                tokio::select! {
                    _ = tokio::time::sleep(step.delay) => {}
                    _ = episode.wake.notified() => {}
                }
                if episode.stopped.load(Ordering::SeqCst) {
                    break;
                }
                let terminal = matches!(step.event, RecognitionEvent::Error(_));
                if tx.send(step.event).is_err() || terminal {
                    return;
                }
            }
            let _ = tx.send(RecognitionEvent::End);
        });

        tracing::debug!("Scripted recognizer started");
        Ok(rx)
    }

    fn stop(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(episode) = current.take() {
                episode.stopped.store(true, Ordering::SeqCst);
                episode.wake.notify_one();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut rx: mpsc::UnboundedReceiver<RecognitionEvent>) -> Vec<RecognitionEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_unsupported_recognizer() {
        let recognizer = UnsupportedRecognizer;
        assert!(!recognizer.is_supported());
        let err = recognizer.start().await.unwrap_err();
        assert!(err.to_string().contains("not supported"));
        recognizer.stop();
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let recognizer = ScriptedRecognizer::utterance(&["show", "show me"], "show me traders");
        let events = collect(recognizer.start().await.unwrap()).await;
        assert_eq!(
            events,
            vec![
                RecognitionEvent::Interim("show".into()),
                RecognitionEvent::Interim("show me".into()),
                RecognitionEvent::Final("show me traders".into()),
                RecognitionEvent::End,
            ]
        );
        assert_eq!(recognizer.start_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_ends_early() {
        let recognizer = ScriptedRecognizer::new(vec![
            ScriptStep::new(0, RecognitionEvent::Interim("hello".into())),
            ScriptStep::new(5_000, RecognitionEvent::Final("never".into())),
        ]);
        let mut rx = recognizer.start().await.unwrap();
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Interim("hello".into())));
        recognizer.stop();
        assert_eq!(rx.recv().await, Some(RecognitionEvent::End));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_error_is_terminal() {
        let recognizer = ScriptedRecognizer::new(vec![
            ScriptStep::new(0, RecognitionEvent::Error("no-speech".into())),
            ScriptStep::new(0, RecognitionEvent::Final("unreachable".into())),
        ]);
        let events = collect(recognizer.start().await.unwrap()).await;
        assert_eq!(events, vec![RecognitionEvent::Error("no-speech".into())]);
    }

    #[tokio::test]
    async fn test_failing_start() {
        let recognizer = ScriptedRecognizer::failing("Microphone permission denied");
        assert!(recognizer.start().await.is_err());
        assert_eq!(recognizer.start_count(), 0);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let recognizer = ScriptedRecognizer::default();
        recognizer.stop();
        recognizer.stop();
    }
}
