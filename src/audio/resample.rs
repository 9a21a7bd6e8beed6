//! Mono sample-rate conversion with rubato.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Resamples one mono chunk from `from` Hz to `to` Hz in a single pass.
pub fn resample_mono(input: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || input.is_empty() {
        return Ok(input.to_vec());
    }
    if from == 0 || to == 0 {
        return Err(PipelineError::Resample(format!("invalid rates {} -> {}", from, to)));
    }

    let mut resampler = FastFixedIn::<f32>::new(
        to as f64 / from as f64,
        1.0,
        PolynomialDegree::Septic,
        input.len(),
        1,
    )
    .map_err(|e| PipelineError::Resample(format!("failed to create resampler: {}", e)))?;

    let planar = vec![input.to_vec()];
    let mut output = resampler
        .process(&planar, None)
        .map_err(|e| PipelineError::Resample(e.to_string()))?;

    let samples = output.pop().unwrap_or_default();
    debug!("Resampled {} samples at {}Hz to {} at {}Hz", input.len(), from, samples.len(), to);
    Ok(samples)
}
