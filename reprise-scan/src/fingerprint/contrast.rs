//! Spectral contrast
//!
//! Octave sub-bands starting at 200 Hz plus a remainder band. For each band
//! the mean of the top and bottom quantile of magnitudes is taken and the
//! contrast is their difference in dB.

use rayon::prelude::*;

use super::stft::fft_frequencies;

/// Number of contrast values (6 octave bands + the remainder)
pub const N_CONTRAST: usize = 7;

const N_OCTAVE_BANDS: usize = N_CONTRAST - 1;
const FMIN_HZ: f32 = 200.0;
const QUANTILE: f32 = 0.02;
const AMIN: f32 = 1e-10;

/// Bin selection for one sub-band
#[derive(Debug, Clone)]
struct SubBand {
    /// Bins included in the band
    bins: Vec<usize>,
    /// Number of bins at each extreme averaged into peak/valley
    extreme_count: usize,
}

fn sub_bands(sample_rate: u32) -> Vec<SubBand> {
    let freqs = fft_frequencies(sample_rate);

    // [0, 200, 400, ..., 12800]
    let mut edges = vec![0.0f32];
    edges.extend((0..=N_OCTAVE_BANDS).map(|k| FMIN_HZ * 2f32.powi(k as i32)));

    (0..N_CONTRAST)
        .map(|k| {
            let (low, high) = (edges[k], edges[k + 1]);
            let mut bins: Vec<usize> = freqs
                .iter()
                .enumerate()
                .filter(|&(_, &f)| f >= low && f <= high)
                .map(|(i, _)| i)
                .collect();

            if let Some(&first) = bins.first() {
                if k > 0 && first > 0 {
                    bins.insert(0, first - 1);
                }
            }
            if k == N_OCTAVE_BANDS {
                if let Some(&last) = bins.last() {
                    bins.extend(last + 1..freqs.len());
                }
            }

            let selected = bins.len();
            if k < N_OCTAVE_BANDS {
                // Shared upper edge belongs to the next band
                bins.pop();
            }

            let extreme_count = ((QUANTILE * selected as f32).round() as usize).max(1);
            SubBand {
                bins,
                extreme_count,
            }
        })
        .collect()
}

fn to_db(value: f32) -> f32 {
    10.0 * value.max(AMIN).log10()
}

/// Contrast frames from a magnitude spectrogram (`[t][bin]` -> `[t][7]`)
///
/// Bands that fall entirely above Nyquist contribute 0.
pub fn spectral_contrast(magnitude: &[Vec<f32>], sample_rate: u32) -> Vec<Vec<f32>> {
    let bands = sub_bands(sample_rate);

    magnitude
        .par_iter()
        .map(|frame| {
            bands
                .iter()
                .map(|band| {
                    if band.bins.is_empty() {
                        return 0.0;
                    }
                    let mut values: Vec<f32> = band.bins.iter().map(|&b| frame[b]).collect();
                    values.sort_unstable_by(f32::total_cmp);

                    let n = band.extreme_count.min(values.len());
                    let valley = values[..n].iter().sum::<f32>() / n as f32;
                    let peak = values[values.len() - n..].iter().sum::<f32>() / n as f32;
                    to_db(peak) - to_db(valley)
                })
                .collect()
        })
        .collect()
}
