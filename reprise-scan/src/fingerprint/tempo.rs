//! Global tempo estimation
//!
//! Onset strength is the mean positive spectral flux of the dB mel
//! spectrogram. Its autocorrelation is scored over lags covering
//! 30-320 BPM, weighted by a log-normal prior centered on 120 BPM.

use super::stft::HOP_LENGTH;

const START_BPM: f32 = 120.0;
/// Prior width in octaves
const STD_BPM: f32 = 1.0;
const MIN_BPM: f32 = 30.0;
const MAX_BPM: f32 = 320.0;

/// Onset strength envelope from a dB mel spectrogram (`[t][mel]`)
pub fn onset_strength(mel_db: &[Vec<f32>]) -> Vec<f32> {
    let mut envelope = Vec::with_capacity(mel_db.len());
    if mel_db.is_empty() {
        return envelope;
    }
    envelope.push(0.0);

    for pair in mel_db.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let flux: f32 = cur
            .iter()
            .zip(prev)
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        envelope.push(flux / cur.len().max(1) as f32);
    }
    envelope
}

/// Estimate global tempo in BPM; 0 when the envelope has no onsets
pub fn estimate_tempo(onset_envelope: &[f32], sample_rate: u32) -> f32 {
    let n = onset_envelope.len();
    let frame_rate = sample_rate as f32 / HOP_LENGTH as f32;

    let energy: f32 = onset_envelope.iter().map(|o| o * o).sum();
    if n < 2 || energy <= f32::EPSILON {
        return 0.0;
    }

    let min_lag = ((60.0 * frame_rate / MAX_BPM).ceil() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / MIN_BPM).floor() as usize).min(n - 1);
    if min_lag > max_lag {
        return 0.0;
    }

    let mut best: Option<(f32, f32)> = None;
    for lag in min_lag..=max_lag {
        let ac: f32 = onset_envelope[..n - lag]
            .iter()
            .zip(&onset_envelope[lag..])
            .map(|(a, b)| a * b)
            .sum();
        let bpm = 60.0 * frame_rate / lag as f32;
        let prior = -0.5 * ((bpm.log2() - START_BPM.log2()) / STD_BPM).powi(2);
        let score = (1.0 + 1e6 * ac / energy).ln() + prior;

        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, bpm));
        }
    }

    best.map(|(_, bpm)| bpm).unwrap_or(0.0)
}
