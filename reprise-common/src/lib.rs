//! # Reprise Common Library
//!
//! Shared code for the Reprise audio reuse scanner:
//! - Error type shared across crates
//! - Configuration loading (TOML, environment, root folder, scratch directories)
//! - Scan event types and the broadcast `EventBus`

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
