use std::sync::{Arc, Mutex};

/// Thread-safe sample buffer shared with a capture callback.
///
/// The capture thread pushes f32 PCM samples; the owner of the episode calls
/// `take()` once on stop. Growth is capped at `max_samples`, keeping the most
/// recent audio.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Arc<Mutex<Vec<f32>>>,
    max_samples: usize,
}

impl AudioBuffer {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::new())),
            max_samples,
        }
    }

    /// Buffer sized for `secs` seconds of mono audio at `sample_rate`.
    pub fn for_duration(sample_rate: u32, secs: u32) -> Self {
        Self::new(sample_rate as usize * secs.max(1) as usize)
    }

    /// Append samples, dropping the oldest ones past capacity.
    pub fn push(&self, data: &[f32]) {
        if let Ok(mut buf) = self.samples.lock() {
            buf.extend_from_slice(data);
            if buf.len() > self.max_samples {
                let excess = buf.len() - self.max_samples;
                buf.drain(..excess);
            }
        }
    }

    /// Drain everything buffered so far.
    pub fn take(&self) -> Vec<f32> {
        match self.samples.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_samples
    }
}
