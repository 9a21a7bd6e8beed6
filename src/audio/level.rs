use crate::error::{PipelineError, Result};

/// Decodes little-endian signed 16-bit PCM into samples in [-1, 1).
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        return Err(PipelineError::MalformedAudio(format!(
            "odd byte count {} for 16-bit PCM",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect())
}

/// RMS energy of a chunk, clamped to [0, 1]. Empty input is silence.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sq_sum: f32 = samples.iter().map(|&x| x * x).sum();
    (sq_sum / samples.len() as f32).sqrt().clamp(0.0, 1.0)
}
