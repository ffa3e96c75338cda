//! Real microphone capture via cpal.
//!
//! With the `microphone` feature, captures the default input device, downmixes
//! and resamples in the callback, and accumulates samples in an
//! [`AudioBuffer`]. Without the feature, the device reports itself unavailable.

use async_trait::async_trait;

use cipherdesk_core::error::{CipherError, Result};

#[cfg(feature = "microphone")]
use crate::buffer::AudioBuffer;
#[cfg(feature = "microphone")]
use std::sync::{Arc, Mutex};
use crate::{AudioDevice, AudioStream};

/// Default system input device.
#[derive(Debug, Clone, Default)]
pub struct MicrophoneDevice {
    /// Name or substring of the device to use; `None` picks the default.
    device_name: Option<String>,
}

impl MicrophoneDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_name(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }
}

// =============================================================================
// cpal implementation
// =============================================================================

/// Wrapper making `cpal::Stream` storable in a `Send` stream handle.
///
/// `cpal::Stream` carries a `!Send` marker on some backends. The handle is only
/// kept alive and dropped; samples flow through the shared buffer.
#[cfg(feature = "microphone")]
struct SendStream(#[allow(dead_code)] cpal::Stream);

// SAFETY: the wrapped stream is never used after construction except to be
// dropped, which stops the backend's capture thread.
#[cfg(feature = "microphone")]
unsafe impl Send for SendStream {}

#[cfg(feature = "microphone")]
pub struct MicrophoneStream {
    stream: Option<SendStream>,
    buffer: AudioBuffer,
    sample_rate: u32,
    /// First error reported by the backend's error callback.
    error: Arc<Mutex<Option<String>>>,
}

#[cfg(feature = "microphone")]
impl AudioStream for MicrophoneStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn take_samples(&mut self) -> Vec<f32> {
        self.buffer.take()
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!("Microphone capture stopped");
        }
    }

    fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

#[cfg(feature = "microphone")]
impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(feature = "microphone")]
impl MicrophoneDevice {
    fn find_device(&self) -> Result<cpal::Device> {
        use cpal::traits::{DeviceTrait, HostTrait};

        let host = cpal::default_host();
        match &self.device_name {
            None => host
                .default_input_device()
                .ok_or_else(|| CipherError::Audio("No default input device found".into())),
            Some(name) => {
                let wanted = name.to_lowercase();
                host.input_devices()
                    .map_err(|e| CipherError::Audio(format!("Failed to enumerate devices: {}", e)))?
                    .find(|d| {
                        d.name()
                            .map(|n| n.to_lowercase().contains(&wanted))
                            .unwrap_or(false)
                    })
                    .ok_or_else(|| CipherError::Audio(format!("Audio device '{}' not found", name)))
            }
        }
    }
}

#[cfg(feature = "microphone")]
#[async_trait]
impl AudioDevice for MicrophoneDevice {
    fn is_available(&self) -> bool {
        self.find_device().is_ok()
    }

    async fn acquire(&self, sample_rate: u32, max_secs: u32) -> Result<Box<dyn AudioStream>> {
        use cpal::traits::{DeviceTrait, StreamTrait};
        use tracing::{debug, info};

        let device = self.find_device()?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| CipherError::Audio(format!("Failed to query input config: {}", e)))?;
        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let device_rate = stream_config.sample_rate.0;
        let device_channels = stream_config.channels;
        debug!(
            device = %device_name,
            device_rate,
            device_channels,
            target_rate = sample_rate,
            "Selected input device"
        );

        let buffer = AudioBuffer::for_duration(sample_rate, max_secs);
        let sink = buffer.clone();
        let error = Arc::new(Mutex::new(None));
        let error_sink = Arc::clone(&error);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = crate::pcm::downmix(data, device_channels);
                    sink.push(&crate::pcm::resample(&mono, device_rate, sample_rate));
                },
                move |err| {
                    tracing::error!("Microphone stream error: {}", err);
                    let mut slot = error_sink.lock().unwrap_or_else(|e| e.into_inner());
                    slot.get_or_insert_with(|| err.to_string());
                },
                None,
            )
            .map_err(|e| CipherError::Audio(format!("Failed to build audio stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| CipherError::Audio(format!("Failed to start audio stream: {}", e)))?;

        info!(device = %device_name, sample_rate, "Microphone capture started");

        Ok(Box::new(MicrophoneStream {
            stream: Some(SendStream(stream)),
            buffer,
            sample_rate,
            error,
        }))
    }
}

// =============================================================================
// Stub without the `microphone` feature
// =============================================================================

#[cfg(not(feature = "microphone"))]
#[async_trait]
impl AudioDevice for MicrophoneDevice {
    fn is_available(&self) -> bool {
        false
    }

    async fn acquire(&self, _sample_rate: u32, _max_secs: u32) -> Result<Box<dyn AudioStream>> {
        tracing::warn!("Microphone capture requested but the `microphone` feature is disabled");
        Err(CipherError::Audio(
            "Microphone capture is not compiled into this build".into(),
        ))
    }
}
