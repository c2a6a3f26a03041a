//! Scan jobs
//!
//! A scan episode discovers candidates for a query, fingerprints a reference
//! clip and every candidate, and classifies each candidate against the
//! reference. Jobs are owned by their episode and observed through
//! immutable snapshots.

pub mod job;
pub mod orchestrator;
pub mod registry;
pub mod resources;

use thiserror::Error;
use uuid::Uuid;

use crate::audio::DecodeError;
use crate::config::ConfigurationError;
use crate::similarity::SimilarityError;
use crate::sources::{AcquisitionError, DiscoveryError};

pub use job::{ScanOutcome, ScanRequest, ScanResult, ScanSnapshot, ScanState, ScanSummary, SkippedCandidate};
pub use orchestrator::ScanOrchestrator;
pub use registry::ScanRegistry;
pub use resources::{TempAudio, TempResourceManager};

/// Scan failures
///
/// Acquisition, decode and extraction failures are fatal for the reference
/// and skip-worthy for a candidate.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Extraction produced no fingerprint (silent or empty audio)")]
    EmptyFingerprint,

    #[error("Similarity failed: {0}")]
    Similarity(#[from] SimilarityError),

    #[error("Scan capacity reached ({running} running)")]
    Busy { running: usize },

    #[error("Scan job not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid scan request: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
