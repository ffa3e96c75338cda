//! Cipherdesk voice crate - voice capture bridge and the keyboard chord that
//! toggles it.
//!
//! The bridge moves live transcripts into the shared input buffer and submits
//! one query per listening episode through a callback injected at
//! construction. The active episode sits behind a mutex.

pub mod bridge;
pub mod shortcut;

pub use bridge::{
    CaptureState, EventFn, SubmitFn, VoiceCaptureBridge, VoiceCollaborators, VoiceEvent,
};
pub use shortcut::{Chord, ChordKey};
