//! Cipherdesk speech crate - live recognition and server-side transcription.
//!
//! Two collaborators feed the voice bridge: a [`SpeechRecognizer`] streaming
//! interim and final transcripts while the user speaks, and a [`Transcriber`]
//! turning a captured clip into text after the episode ends. Both come with
//! mock implementations for tests.

pub mod recognizer;
pub mod transcriber;

pub use recognizer::{
    RecognitionEvent, ScriptStep, ScriptedRecognizer, SpeechRecognizer, UnsupportedRecognizer,
};
pub use transcriber::{
    AudioClip, HttpTranscriber, MockTranscriber, SpeechStatus, Transcriber, TranscriptionRequest,
    TranscriptionResponse,
};
