//! Configuration resolution for reprise-scan
//!
//! Provides multi-tier resolution of the discovery API credential with
//! CLI → ENV → TOML priority.

use reprise_common::config::TomlConfig;
use reprise_common::{Error, Result};
use thiserror::Error as ThisError;
use tracing::{info, warn};

/// Primary environment variable for the discovery API key
pub const DISCOVERY_API_KEY_ENV: &str = "REPRISE_DISCOVERY_API_KEY";

/// Legacy environment variable accepted for the discovery API key
pub const LEGACY_API_KEY_ENV: &str = "API_KEY";

/// Configuration problems that prevent a scan from starting
#[derive(Debug, Clone, ThisError, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A required credential is absent
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// A setting has an unusable value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Resolve the discovery API key
///
/// **Priority:** CLI → `REPRISE_DISCOVERY_API_KEY` → `API_KEY` → TOML
pub fn resolve_discovery_api_key(cli_key: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    let candidates = [
        ("command line", cli_key.map(str::to_string)),
        ("environment", std::env::var(DISCOVERY_API_KEY_ENV).ok()),
        ("environment (API_KEY)", std::env::var(LEGACY_API_KEY_ENV).ok()),
        ("TOML config", toml_config.discovery_api_key.clone()),
    ];

    let valid: Vec<(&str, String)> = candidates
        .into_iter()
        .filter_map(|(source, key)| key.filter(|k| is_valid_key(k)).map(|k| (source, k)))
        .collect();

    // Warn if multiple sources (potential misconfiguration)
    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(s, _)| *s).collect();
        warn!(
            "Discovery API key found in multiple sources: {}. Using {}.",
            sources.join(", "),
            sources[0]
        );
    }

    match valid.into_iter().next() {
        Some((source, key)) => {
            info!("Discovery API key loaded from {}", source);
            Ok(key)
        }
        None => Err(Error::Config(format!(
            "Discovery API key not configured. Set one of:\n\
             1. Command line: --discovery-api-key <key>\n\
             2. Environment: {}=<key> (or {})\n\
             3. TOML config: discovery_api_key = \"<key>\"",
            DISCOVERY_API_KEY_ENV, LEGACY_API_KEY_ENV
        ))),
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
