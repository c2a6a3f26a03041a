//! Configuration loading and root folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: the service logs a warning
//! and continues with compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "REPRISE_ROOT_FOLDER";

/// Environment variable pointing at an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "REPRISE_CONFIG";

/// Environment variables overriding `[scan]` settings
pub const SIMILARITY_THRESHOLD_ENV: &str = "REPRISE_SIMILARITY_THRESHOLD";
pub const SEGMENT_DURATION_ENV: &str = "REPRISE_SEGMENT_DURATION_SECS";
pub const FRAGMENT_DURATION_ENV: &str = "REPRISE_FRAGMENT_DURATION_SECS";
pub const FETCH_TIMEOUT_ENV: &str = "REPRISE_FETCH_TIMEOUT_SECS";
pub const MAX_CONCURRENT_SCANS_ENV: &str = "REPRISE_MAX_CONCURRENT_SCANS";

/// Name of the scratch directory holding uploaded reference clips
pub const UPLOADS_DIR: &str = "uploads";

/// Name of the scratch directory holding transient downloaded audio
pub const AUDIO_TEMP_DIR: &str = "audio_temp";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional so that a partial (or absent) file still loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the scratch directories
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP bind address, e.g. "127.0.0.1"
    #[serde(default)]
    pub host: Option<String>,

    /// HTTP port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Credential for the video discovery API
    #[serde(default)]
    pub discovery_api_key: Option<String>,

    /// Scan tuning parameters
    #[serde(default)]
    pub scan: ScanSettings,

    /// Audio acquisition settings
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Scan tuning parameters
///
/// The threshold and duration values are empirical; they are exposed as
/// configuration rather than baked into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Similarity above which a candidate is reported as a match
    pub similarity_threshold: f64,
    /// Maximum seconds of each waveform fed to the feature extractor
    pub segment_duration_secs: f64,
    /// Maximum seconds decoded from any acquired source
    pub fragment_duration_secs: f64,
    /// Per-acquisition timeout
    pub fetch_timeout_secs: u64,
    /// Sample rate every waveform is normalized to (None keeps the native rate)
    pub analysis_sample_rate: Option<u32>,
    /// Upper bound on concurrently running scans
    pub max_concurrent_scans: usize,
    /// Number of finished scans kept for status queries
    pub job_history: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.97,
            segment_duration_secs: 1000.0,
            fragment_duration_secs: 1000.0,
            fetch_timeout_secs: 120,
            analysis_sample_rate: Some(22_050),
            max_concurrent_scans: 1,
            job_history: 32,
        }
    }
}

/// Parse one override variable; unset or blank means "no override"
fn env_override<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", name, raw, e))),
        _ => Ok(None),
    }
}

impl ScanSettings {
    /// Apply `REPRISE_*` environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_override(SIMILARITY_THRESHOLD_ENV)? {
            self.similarity_threshold = v;
        }
        if let Some(v) = env_override(SEGMENT_DURATION_ENV)? {
            self.segment_duration_secs = v;
        }
        if let Some(v) = env_override(FRAGMENT_DURATION_ENV)? {
            self.fragment_duration_secs = v;
        }
        if let Some(v) = env_override(FETCH_TIMEOUT_ENV)? {
            self.fetch_timeout_secs = v;
        }
        if let Some(v) = env_override(MAX_CONCURRENT_SCANS_ENV)? {
            self.max_concurrent_scans = v;
        }
        Ok(())
    }

    /// Reject values that would make scans meaningless
    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::Config(format!(
                "similarity_threshold must be within [-1, 1], got {}",
                self.similarity_threshold
            )));
        }
        for (name, value) in [
            ("segment_duration_secs", self.segment_duration_secs),
            ("fragment_duration_secs", self.fragment_duration_secs),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!(
                    "{} must be a positive finite number of seconds, got {}",
                    name, value
                )));
            }
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Config("fetch_timeout_secs must be positive".to_string()));
        }
        if self.analysis_sample_rate == Some(0) {
            return Err(Error::Config("analysis_sample_rate must be positive".to_string()));
        }
        if self.max_concurrent_scans == 0 {
            return Err(Error::Config("max_concurrent_scans must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Audio acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// yt-dlp executable (name on PATH or absolute path)
    pub yt_dlp_path: String,
    /// Optional cookies file handed to yt-dlp
    pub cookies_file: Option<PathBuf>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            cookies_file: None,
        }
    }
}

impl TomlConfig {
    /// Load the TOML config from an explicit path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        config.scan.validate()?;
        Ok(config)
    }

    /// Load the TOML config, falling back to defaults when no file exists
    ///
    /// Lookup order: explicit path, `REPRISE_CONFIG`, platform config dir.
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not. `REPRISE_*` scan overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_file(explicit)?;
        config.scan.apply_env_overrides()?;
        config.scan.validate()?;
        Ok(config)
    }

    fn load_file(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            return Self::from_file(Path::new(&path));
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Platform config file location (`<config dir>/reprise/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("reprise").join("config.toml"))
}

/// Root folder resolution
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("reprise"))
        .unwrap_or_else(|| PathBuf::from("./reprise_data"))
}

/// The two scratch directories every scan relies on
#[derive(Debug, Clone)]
pub struct ScratchDirs {
    /// Uploaded / staged reference clips
    pub uploads: PathBuf,
    /// Transient downloaded audio, removed after each use
    pub audio_temp: PathBuf,
}

impl ScratchDirs {
    /// Scratch directory paths under `root` (nothing is created)
    pub fn under(root: &Path) -> Self {
        Self {
            uploads: root.join(UPLOADS_DIR),
            audio_temp: root.join(AUDIO_TEMP_DIR),
        }
    }

    /// Create both scratch directories under `root` if missing
    pub fn ensure(root: &Path) -> Result<Self> {
        let dirs = Self::under(root);
        for dir in [&dirs.uploads, &dirs.audio_temp] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        info!(
            uploads = %dirs.uploads.display(),
            audio_temp = %dirs.audio_temp.display(),
            "Scratch directories ready"
        );
        Ok(dirs)
    }
}
