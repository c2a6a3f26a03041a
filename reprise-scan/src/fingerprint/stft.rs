//! Short-time Fourier transform
//!
//! Frames are centered (the signal is zero padded by half a window on both
//! sides), Hann windowed and transformed with rustfft. Only the non-negative
//! frequency bins are kept.

use std::f32::consts::PI;

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

/// FFT size in samples
pub const N_FFT: usize = 2048;

/// Hop between consecutive frames in samples
pub const HOP_LENGTH: usize = 512;

/// Number of non-negative frequency bins
pub const N_BINS: usize = N_FFT / 2 + 1;

/// Magnitude spectrogram, frame-major (`frames[t][bin]`)
#[derive(Debug, Clone)]
pub struct Spectrogram {
    frames: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl Spectrogram {
    /// Compute the magnitude STFT of `samples`
    pub fn magnitude(samples: &[f32], sample_rate: u32) -> Self {
        let half = N_FFT / 2;
        let mut padded = vec![0.0f32; samples.len() + N_FFT];
        padded[half..half + samples.len()].copy_from_slice(samples);

        let n_frames = 1 + (padded.len() - N_FFT) / HOP_LENGTH;
        let window = hann_window(N_FFT);

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(N_FFT);

        let frames = (0..n_frames)
            .into_par_iter()
            .map(|t| {
                let start = t * HOP_LENGTH;
                let mut buffer: Vec<Complex<f32>> = padded[start..start + N_FFT]
                    .iter()
                    .zip(&window)
                    .map(|(&s, &w)| Complex { re: s * w, im: 0.0 })
                    .collect();
                fft.process(&mut buffer);

                buffer[..N_BINS].iter().map(|c| c.norm()).collect()
            })
            .collect();

        Self {
            frames,
            sample_rate,
        }
    }

    /// Build from precomputed magnitude frames
    pub fn from_frames(frames: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }

    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Squared magnitudes
    pub fn power(&self) -> Vec<Vec<f32>> {
        self.frames
            .par_iter()
            .map(|frame| frame.iter().map(|m| m * m).collect())
            .collect()
    }
}

/// Center frequency of each FFT bin in Hz
pub fn fft_frequencies(sample_rate: u32) -> Vec<f32> {
    (0..N_BINS)
        .map(|k| k as f32 * sample_rate as f32 / N_FFT as f32)
        .collect()
}

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n).cos())
        .collect()
}
