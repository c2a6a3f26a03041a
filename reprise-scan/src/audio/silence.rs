//! Leading/trailing silence trimming
//!
//! Frame-based RMS measurement: frames are centered on multiples of the hop
//! length (zero padded at the edges), and a frame is silent when its energy
//! is more than `top_db` below the loudest frame.

/// Energy floor below which a signal counts as digital silence
const AMIN: f32 = 1e-10;

/// Silence trimmer
#[derive(Debug, Clone)]
pub struct SilenceTrimmer {
    /// Threshold below the loudest frame in dB (default: 60)
    top_db: f32,

    /// RMS frame length in samples (default: 2048)
    frame_length: usize,

    /// Hop between frame centers in samples (default: 512)
    hop_length: usize,
}

impl Default for SilenceTrimmer {
    fn default() -> Self {
        Self::new()
    }
}

impl SilenceTrimmer {
    /// Create new trimmer with defaults
    pub fn new() -> Self {
        Self {
            top_db: 60.0,
            frame_length: 2048,
            hop_length: 512,
        }
    }

    /// Set the silence threshold in dB below the loudest frame
    pub fn with_top_db(mut self, top_db: f32) -> Self {
        self.top_db = top_db.abs();
        self
    }

    /// Return the non-silent span of `samples`
    ///
    /// An all-zero (or empty) signal trims to an empty slice.
    pub fn trim<'a>(&self, samples: &'a [f32]) -> &'a [f32] {
        let range = self.non_silent_range(samples);
        &samples[range]
    }

    /// Sample range between the first and last non-silent frame
    pub fn non_silent_range(&self, samples: &[f32]) -> std::ops::Range<usize> {
        if samples.is_empty() {
            return 0..0;
        }

        let energies = self.frame_energies(samples);
        let loudest = energies.iter().copied().fold(0.0f32, f32::max);
        if loudest <= AMIN {
            return 0..0;
        }

        let ref_db = power_db(loudest);
        let is_sound = |e: &f32| power_db(*e) - ref_db > -self.top_db;

        let first = energies.iter().position(is_sound);
        let last = energies.iter().rposition(is_sound);

        match (first, last) {
            (Some(first), Some(last)) => {
                let start = (first * self.hop_length).min(samples.len());
                let end = ((last + 1) * self.hop_length).min(samples.len());
                start..end.max(start)
            }
            _ => 0..0,
        }
    }

    /// Mean-square energy of each centered frame
    fn frame_energies(&self, samples: &[f32]) -> Vec<f32> {
        let half = self.frame_length / 2;
        let n_frames = 1 + samples.len() / self.hop_length;

        (0..n_frames)
            .map(|i| {
                let center = i * self.hop_length;
                let start = center.saturating_sub(half);
                let end = (center + half).min(samples.len());
                let sum: f32 = samples[start.min(end)..end].iter().map(|s| s * s).sum();
                sum / self.frame_length as f32
            })
            .collect()
    }
}

fn power_db(power: f32) -> f32 {
    10.0 * power.max(AMIN).log10()
}
