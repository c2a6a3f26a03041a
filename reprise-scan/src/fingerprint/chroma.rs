//! Chroma (pitch class) profiles
//!
//! Each FFT bin is assigned to its nearest equal-tempered pitch class
//! (A4 = 440 Hz, C = 0) and its power accumulated there.

use rayon::prelude::*;

use super::stft::fft_frequencies;

/// Number of pitch classes
pub const N_CHROMA: usize = 12;

/// Bins below this frequency carry no usable pitch information
const MIN_PITCH_HZ: f32 = 20.0;

/// Per-frame chroma normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaNorm {
    /// Scale so the strongest class is 1
    Max,
    /// Scale so the classes sum to 1
    L1,
}

/// Pitch class of every FFT bin (None for bins outside the pitch range)
pub fn bin_pitch_classes(sample_rate: u32) -> Vec<Option<usize>> {
    fft_frequencies(sample_rate)
        .into_iter()
        .map(|f| {
            if f < MIN_PITCH_HZ {
                return None;
            }
            let midi = 69.0 + 12.0 * (f / 440.0).log2();
            Some((midi.round() as i64).rem_euclid(N_CHROMA as i64) as usize)
        })
        .collect()
}

/// Chromagram from a power spectrogram (`[t][bin]` -> `[t][12]`)
pub fn chromagram(power: &[Vec<f32>], sample_rate: u32, norm: ChromaNorm) -> Vec<Vec<f32>> {
    let classes = bin_pitch_classes(sample_rate);

    power
        .par_iter()
        .map(|frame| {
            let mut chroma = vec![0.0f32; N_CHROMA];
            for (p, class) in frame.iter().zip(&classes) {
                if let Some(c) = class {
                    chroma[*c] += p;
                }
            }

            let scale = match norm {
                ChromaNorm::Max => chroma.iter().copied().fold(0.0f32, f32::max),
                ChromaNorm::L1 => chroma.iter().map(|c| c.abs()).sum(),
            };
            if scale > 0.0 {
                chroma.iter_mut().for_each(|c| *c /= scale);
            }
            chroma
        })
        .collect()
}
