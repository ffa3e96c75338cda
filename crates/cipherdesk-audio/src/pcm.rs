//! Sample conversion and packaging for the transcription collaborator.

/// Average interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Resample mono audio by linear interpolation.
pub fn resample(mono: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || mono.is_empty() || to_rate == 0 {
        return mono.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (mono.len() as f64 / ratio).ceil() as usize;
    let last = mono.len() - 1;
    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx0 = (src.floor() as usize).min(last);
            let idx1 = (idx0 + 1).min(last);
            let frac = (src - idx0 as f64) as f32;
            mono[idx0] * (1.0 - frac) + mono[idx1] * frac
        })
        .collect()
}

/// Encode f32 samples in [-1.0, 1.0] as 16-bit little-endian PCM.
///
/// Out-of-range samples are clamped.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Length of a mono clip in seconds.
pub fn duration_secs(samples: usize, sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f32 / sample_rate as f32
}
