use std::sync::{Arc, Mutex};

/// The pending input text shared between typed and dictated input.
///
/// Cloning gives another handle to the same buffer. The session controller
/// clears it on submit; the voice bridge overwrites it with live transcripts.
#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    text: Arc<Mutex<String>>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer contents.
    pub fn set(&self, text: impl Into<String>) {
        let mut guard = self.text.lock().unwrap_or_else(|e| e.into_inner());
        *guard = text.into();
    }

    /// Current contents.
    pub fn get(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Empty the buffer, returning what it held.
    pub fn take(&self) -> String {
        let mut guard = self.text.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *guard)
    }

    pub fn clear(&self) {
        self.set(String::new());
    }

    pub fn is_empty(&self) -> bool {
        self.get().trim().is_empty()
    }
}
