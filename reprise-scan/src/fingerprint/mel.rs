//! Mel filterbank and log-power conversion
//!
//! Slaney-style mel scale (linear below 1 kHz, logarithmic above) with
//! Slaney area normalization, so each triangular filter has unit area
//! in the mel domain.

use rayon::prelude::*;

use super::stft::{fft_frequencies, N_BINS};

/// Number of mel bands
pub const N_MELS: usize = 128;

/// Floor applied before taking logarithms
pub const AMIN: f32 = 1e-10;

/// Dynamic range kept by [`power_to_db`]
pub const TOP_DB: f32 = 80.0;

const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

/// Hz to mel (Slaney)
pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Mel (Slaney) to Hz
pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// One triangular filter, stored sparsely
#[derive(Debug, Clone)]
struct MelBand {
    first_bin: usize,
    weights: Vec<f32>,
}

/// Triangular mel filterbank over `[0, sample_rate / 2]`
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    bands: Vec<MelBand>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_mels: usize) -> Self {
        let fft_freqs = fft_frequencies(sample_rate);
        let max_mel = hz_to_mel(sample_rate as f32 / 2.0);

        let edges: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(max_mel * i as f32 / (n_mels + 1) as f32))
            .collect();

        let bands = (0..n_mels)
            .map(|m| {
                let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
                let enorm = 2.0 / (upper - lower);

                let weights: Vec<(usize, f32)> = fft_freqs
                    .iter()
                    .enumerate()
                    .filter_map(|(k, &f)| {
                        let rising = (f - lower) / (center - lower);
                        let falling = (upper - f) / (upper - center);
                        let w = rising.min(falling).max(0.0);
                        (w > 0.0).then_some((k, w * enorm))
                    })
                    .collect();

                match weights.first() {
                    Some(&(first_bin, _)) => MelBand {
                        first_bin,
                        weights: weights.iter().map(|&(_, w)| w).collect(),
                    },
                    None => MelBand {
                        first_bin: 0,
                        weights: Vec::new(),
                    },
                }
            })
            .collect();

        Self { bands }
    }

    pub fn n_mels(&self) -> usize {
        self.bands.len()
    }

    /// Project one power frame (`N_BINS` values) onto the mel bands
    pub fn apply(&self, power_frame: &[f32]) -> Vec<f32> {
        debug_assert_eq!(power_frame.len(), N_BINS);
        self.bands
            .iter()
            .map(|band| {
                band.weights
                    .iter()
                    .zip(&power_frame[band.first_bin..])
                    .map(|(w, p)| w * p)
                    .sum()
            })
            .collect()
    }

    /// Mel power spectrogram (`[t][mel]`)
    pub fn spectrogram(&self, power: &[Vec<f32>]) -> Vec<Vec<f32>> {
        power.par_iter().map(|frame| self.apply(frame)).collect()
    }
}

/// Convert power values to dB (reference 1.0), clipped to `TOP_DB` below
/// the global maximum
pub fn power_to_db(power: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let mut db: Vec<Vec<f32>> = power
        .iter()
        .map(|frame| frame.iter().map(|&p| 10.0 * p.max(AMIN).log10()).collect())
        .collect();

    let peak = db
        .iter()
        .flatten()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;

    for value in db.iter_mut().flatten() {
        *value = value.max(floor);
    }
    db
}
