//! Sample rate conversion
//!
//! High-quality sinc resampling with rubato, processing the whole signal in a
//! single pass.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use super::loader::DecodeError;

/// Resample mono samples from `source_rate` to `target_rate`
///
/// # Algorithm
/// - Sinc interpolation with BlackmanHarris2 window
/// - 256-tap filter, 0.95 cutoff to prevent aliasing
/// - Chunk size equal to input length for single-pass processing
pub fn resample_mono(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, DecodeError> {
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }
    if source_rate == 0 || target_rate == 0 {
        return Err(DecodeError::Resample(format!(
            "invalid rates {} -> {}",
            source_rate, target_rate
        )));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let resampled = output.pop().unwrap_or_default();

    debug!(
        "Resampled {} samples ({} Hz) -> {} samples ({} Hz)",
        samples.len(),
        source_rate,
        resampled.len(),
        target_rate
    );

    Ok(resampled)
}
