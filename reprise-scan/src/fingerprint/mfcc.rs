//! Mel-frequency cepstral coefficients

use std::f32::consts::PI;

use rayon::prelude::*;

/// Number of cepstral coefficients kept
pub const N_MFCC: usize = 40;

/// Orthonormal DCT-II basis (`n_out` rows of length `n_in`)
fn dct_basis(n_in: usize, n_out: usize) -> Vec<Vec<f32>> {
    let n = n_in as f32;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| scale * (PI * k as f32 * (2 * i + 1) as f32 / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

/// MFCC frames from a log-power (dB) mel spectrogram (`[t][mel]`)
pub fn mfcc(mel_db: &[Vec<f32>], n_mfcc: usize) -> Vec<Vec<f32>> {
    let Some(n_mels) = mel_db.first().map(Vec::len) else {
        return Vec::new();
    };
    let basis = dct_basis(n_mels, n_mfcc);

    mel_db
        .par_iter()
        .map(|frame| {
            basis
                .iter()
                .map(|row| row.iter().zip(frame).map(|(b, x)| b * x).sum())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_spectrum_has_only_dc_term() {
        let frames = vec![vec![-20.0f32; 128]; 3];
        let coeffs = mfcc(&frames, N_MFCC);

        assert_eq!(coeffs.len(), 3);
        assert_eq!(coeffs[0].len(), N_MFCC);
        // c0 = sqrt(1/N) * sum = sqrt(128) * -20
        assert!((coeffs[0][0] - (-20.0 * 128f32.sqrt())).abs() < 1e-2);
        assert!(coeffs[0][1..].iter().all(|c| c.abs() < 1e-3));
    }

    #[test]
    fn test_dct_basis_is_orthonormal() {
        let basis = dct_basis(16, 16);
        for (i, a) in basis.iter().enumerate() {
            for (j, b) in basis.iter().enumerate() {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(mfcc(&[], N_MFCC).is_empty());
    }
}
