//! Test Helper Utilities
//!
//! Shared utilities for testing reprise-scan

#![allow(dead_code)]

pub mod audio_generator;
pub mod fakes;

// Re-export commonly used items
pub use audio_generator::{noise_wav_bytes, silence_wav_bytes, tone_wav_bytes, AudioConfig};
pub use fakes::{build_pipeline, FakeDiscovery, FakeFetcher, FetchBehavior, Pipeline};
