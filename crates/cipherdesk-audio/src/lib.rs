//! Cipherdesk audio crate - capture device lifecycle, sample buffering and PCM
//! packaging for server-side transcription.
//!
//! Provides trait-based abstractions over an exclusive input device plus a mock
//! implementation for testing without hardware. A real microphone backed by
//! cpal is available with the `microphone` feature.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use cipherdesk_core::error::{CipherError, Result};

pub mod buffer;
pub mod microphone;
pub mod pcm;

pub use buffer::AudioBuffer;
pub use microphone::MicrophoneDevice;
pub use pcm::encode_pcm16;

// =============================================================================
// Traits
// =============================================================================

/// An exclusive audio input device.
///
/// `acquire` may suspend while the platform asks for capture permission.
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Whether capture is possible at all on this host.
    fn is_available(&self) -> bool;

    /// Open the device and start capturing mono audio at `sample_rate`,
    /// keeping at most `max_secs` seconds.
    async fn acquire(&self, sample_rate: u32, max_secs: u32) -> Result<Box<dyn AudioStream>>;
}

/// A running capture held for one listening episode.
///
/// `release` stops capture and frees the device. It is idempotent, and
/// implementations also release on drop.
pub trait AudioStream: Send {
    /// Sample rate of the samples returned by `take_samples`.
    fn sample_rate(&self) -> u32;

    /// Drain the samples captured so far.
    fn take_samples(&mut self) -> Vec<f32>;

    fn release(&mut self);

    fn is_released(&self) -> bool;

    /// Take a capture error reported since the last call, if any.
    ///
    /// A stream that reported an error has stopped delivering samples.
    fn take_error(&mut self) -> Option<String>;
}

// =============================================================================
// Mock implementation
// =============================================================================

#[derive(Debug, Default)]
struct DeviceStats {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

/// Mock audio device for testing.
///
/// Hands out streams preloaded with fixed samples and counts acquisitions and
/// releases so tests can assert the device is never left open.
#[derive(Debug, Clone)]
pub struct MockAudioDevice {
    available: bool,
    failure: Option<String>,
    midway_failure: Option<String>,
    samples: Vec<f32>,
    stats: Arc<DeviceStats>,
}

impl Default for MockAudioDevice {
    fn default() -> Self {
        Self::new(vec![0.0; 1600])
    }
}

impl MockAudioDevice {
    /// A device whose streams yield `samples`.
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            available: true,
            failure: None,
            midway_failure: None,
            samples,
            stats: Arc::new(DeviceStats::default()),
        }
    }

    /// A host with no input device.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    /// A device whose acquisition fails, e.g. permission denied.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// A device that acquires normally, then reports `reason` as a capture
    /// error on the stream it handed out.
    pub fn failing_midway(reason: impl Into<String>) -> Self {
        Self {
            midway_failure: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn acquired_count(&self) -> usize {
        self.stats.acquired.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> usize {
        self.stats.released.load(Ordering::SeqCst)
    }

    /// Whether a stream is currently open.
    pub fn is_held(&self) -> bool {
        self.acquired_count() > self.released_count()
    }
}

#[async_trait]
impl AudioDevice for MockAudioDevice {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn acquire(&self, sample_rate: u32, _max_secs: u32) -> Result<Box<dyn AudioStream>> {
        if !self.available {
            return Err(CipherError::Audio("No audio input device".into()));
        }
        if let Some(reason) = &self.failure {
            return Err(CipherError::Audio(reason.clone()));
        }
        if self.is_held() {
            return Err(CipherError::Audio("Audio device is already in use".into()));
        }
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(sample_rate, "Mock audio device acquired");
        Ok(Box::new(MockAudioStream {
            sample_rate,
            samples: self.samples.clone(),
            error: self.midway_failure.clone(),
            released: AtomicBool::new(false),
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// Stream handed out by [`MockAudioDevice`].
#[derive(Debug)]
pub struct MockAudioStream {
    sample_rate: u32,
    samples: Vec<f32>,
    error: Option<String>,
    released: AtomicBool,
    stats: Arc<DeviceStats>,
}

impl AudioStream for MockAudioStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn take_samples(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }

    fn release(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.stats.released.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("Mock audio device released");
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}

impl Drop for MockAudioStream {
    fn drop(&mut self) {
        self.release();
    }
}

// =============================================================================
// Tests
// =============================================================================
