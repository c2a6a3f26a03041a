//! Similarity scoring and match classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// Default similarity threshold for a match
pub const DEFAULT_THRESHOLD: f64 = 0.97;

/// Why two vectors could not be compared
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimilarityError {
    /// One side has zero magnitude (e.g. the extraction sentinel)
    #[error("Cannot compare a zero-magnitude vector")]
    ZeroVector,

    #[error("Dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Cosine similarity of two equal-length vectors, in [-1, 1]
///
/// Accumulates in f64 and clamps against rounding so identical inputs score
/// exactly within range.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::ZeroVector);
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_nan() {
        return Err(SimilarityError::ZeroVector);
    }
    Ok(score.clamp(-1.0, 1.0))
}

/// Cosine similarity of two fingerprints
pub fn fingerprint_similarity(a: &Fingerprint, b: &Fingerprint) -> Result<f64, SimilarityError> {
    cosine_similarity(&a.to_vector(), &b.to_vector())
}

/// Binary verdict for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchVerdict {
    Match,
    NoMatch,
}

/// Match iff `score` strictly exceeds `threshold`
pub fn classify(score: f64, threshold: f64) -> MatchVerdict {
    if score > threshold {
        MatchVerdict::Match
    } else {
        MatchVerdict::NoMatch
    }
}

/// Classifier bound to a configured threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchClassifier {
    threshold: f64,
}

impl Default for MatchClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl MatchClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, score: f64) -> MatchVerdict {
        classify(score, self.threshold)
    }
}
