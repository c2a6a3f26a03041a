//! Harmonic/percussive source separation
//!
//! Median filtering of the magnitude spectrogram: harmonic content is
//! smooth along time, percussive content is smooth along frequency. Soft
//! (Wiener-style) masks split each bin between the two.

use rayon::prelude::*;

/// Median filter length along each axis
pub const KERNEL_SIZE: usize = 31;

/// Exponent applied to the filtered spectrograms when building masks
const MASK_POWER: i32 = 2;

/// Reflect an out-of-range index back into `0..len` (edge sample repeated)
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}

fn median(window: &mut [f32]) -> f32 {
    let mid = window.len() / 2;
    let (_, value, _) = window.select_nth_unstable_by(mid, f32::total_cmp);
    *value
}

/// Median along time for every bin
fn median_filter_time(spec: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let n_frames = spec.len();
    let half = (KERNEL_SIZE / 2) as isize;

    (0..n_frames)
        .into_par_iter()
        .map(|t| {
            let n_bins = spec[t].len();
            let mut window = vec![0.0f32; KERNEL_SIZE];
            (0..n_bins)
                .map(|f| {
                    for (slot, offset) in window.iter_mut().zip(-half..=half) {
                        *slot = spec[reflect(t as isize + offset, n_frames)][f];
                    }
                    median(&mut window)
                })
                .collect()
        })
        .collect()
}

/// Median along frequency within every frame
fn median_filter_freq(spec: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let half = (KERNEL_SIZE / 2) as isize;

    spec.par_iter()
        .map(|frame| {
            let n_bins = frame.len();
            let mut window = vec![0.0f32; KERNEL_SIZE];
            (0..n_bins)
                .map(|f| {
                    for (slot, offset) in window.iter_mut().zip(-half..=half) {
                        *slot = frame[reflect(f as isize + offset, n_bins)];
                    }
                    median(&mut window)
                })
                .collect()
        })
        .collect()
}

/// Harmonic component of a magnitude spectrogram (`[t][bin]`)
///
/// The percussive estimate is only used to build the mask and is dropped.
pub fn harmonic(magnitude: &[Vec<f32>]) -> Vec<Vec<f32>> {
    if magnitude.is_empty() {
        return Vec::new();
    }

    let harm = median_filter_time(magnitude);
    let perc = median_filter_freq(magnitude);

    magnitude
        .par_iter()
        .zip(harm.par_iter().zip(perc.par_iter()))
        .map(|(frame, (h_frame, p_frame))| {
            frame
                .iter()
                .zip(h_frame.iter().zip(p_frame))
                .map(|(&s, (&h, &p))| s * soft_mask(h, p))
                .collect()
        })
        .collect()
}

/// Fraction of a bin assigned to `x` when competing with `reference`
fn soft_mask(x: f32, reference: f32) -> f32 {
    let z = x.max(reference);
    if z <= f32::MIN_POSITIVE {
        return 0.0;
    }
    let x = (x / z).powi(MASK_POWER);
    let r = (reference / z).powi(MASK_POWER);
    x / (x + r)
}
