//! Waveform loading
//!
//! Turns an arbitrary compressed byte stream (or file) into a canonical mono
//! PCM [`Waveform`]: decode with symphonia, mix to mono, resample with rubato
//! and trim leading/trailing near-silence.

pub mod loader;
pub mod resample;
pub mod silence;

pub use loader::{load_waveform_from_bytes, load_waveform_from_file, DecodeError, LoadOptions};
pub use silence::SilenceTrimmer;

/// Mono PCM waveform
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Mono samples (f32, nominal range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Sample rate in Hz (always > 0)
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// True when no samples remain (e.g. after trimming an all-silent source)
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Leading portion of at most `max_seconds`
    pub fn head(&self, max_seconds: f64) -> &[f32] {
        let max_samples = (max_seconds.max(0.0) * self.sample_rate as f64) as usize;
        &self.samples[..self.samples.len().min(max_samples)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_and_head() {
        let waveform = Waveform::new(vec![0.1; 44_100], 22_050);
        assert_eq!(waveform.duration_seconds(), 2.0);
        assert_eq!(waveform.head(1.0).len(), 22_050);
        assert_eq!(waveform.head(10.0).len(), 44_100);
        assert!(waveform.head(0.0).is_empty());
    }

    #[test]
    fn test_empty_waveform() {
        let waveform = Waveform::new(Vec::new(), 22_050);
        assert!(waveform.is_empty());
        assert_eq!(waveform.duration_seconds(), 0.0);
    }
}
