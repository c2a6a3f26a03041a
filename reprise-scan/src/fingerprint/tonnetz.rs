//! Tonal centroid features
//!
//! Projects L1-normalized chroma onto three circles: fifths, minor thirds
//! and major thirds, giving 6 coordinates per frame.

use std::f32::consts::PI;

use super::chroma::N_CHROMA;

/// Number of tonnetz coordinates
pub const N_TONNETZ: usize = 6;

/// Projection matrix (`[6][12]`)
fn projection() -> [[f32; N_CHROMA]; N_TONNETZ] {
    // (angle step, radius) for fifths, minor thirds, major thirds
    let circles = [(7.0 * PI / 6.0, 1.0f32), (3.0 * PI / 2.0, 1.0), (2.0 * PI / 3.0, 0.5)];

    let mut phi = [[0.0f32; N_CHROMA]; N_TONNETZ];
    for (c, &(step, radius)) in circles.iter().enumerate() {
        for k in 0..N_CHROMA {
            let angle = step * k as f32;
            phi[2 * c][k] = radius * angle.sin();
            phi[2 * c + 1][k] = radius * angle.cos();
        }
    }
    phi
}

/// Tonnetz frames from L1-normalized chroma frames (`[t][12]` -> `[t][6]`)
pub fn tonnetz(chroma_l1: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let phi = projection();
    chroma_l1
        .iter()
        .map(|chroma| {
            phi.iter()
                .map(|row| row.iter().zip(chroma).map(|(p, c)| p * c).sum())
                .collect()
        })
        .collect()
}
