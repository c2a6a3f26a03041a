//! Temporary audio resources
//!
//! Fetched byte streams are materialized as uniquely named files in the
//! transient-audio scratch directory. Each file is owned by a [`TempAudio`]
//! guard that removes it exactly once: on [`TempAudio::release`] or, failing
//! that, on drop.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::sources::{AcquisitionError, AudioFetcher, AudioSource};

/// Removal of a temporary file failed (logged, never propagated)
#[derive(Debug, Error)]
#[error("Failed to remove temporary audio {path}: {source}")]
pub struct ResourceCleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Owner of all transient audio files
#[derive(Debug, Clone)]
pub struct TempResourceManager {
    dir: PathBuf,
    fetch_timeout: Duration,
    live: Arc<AtomicUsize>,
}

impl TempResourceManager {
    pub fn new(dir: impl Into<PathBuf>, fetch_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            fetch_timeout,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Number of acquired resources not yet released
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Fetch `source` (bounded by the fetch timeout) and stage it on disk
    pub async fn acquire(
        &self,
        source: &AudioSource,
        fetcher: &dyn AudioFetcher,
    ) -> Result<TempAudio, AcquisitionError> {
        let bytes = tokio::time::timeout(self.fetch_timeout, fetcher.fetch(&source.locator))
            .await
            .map_err(|_| AcquisitionError::Timeout(self.fetch_timeout))??;

        let dir = self.dir.clone();
        let suffix = source
            .extension_hint()
            .map(|ext| format!(".{}", ext))
            .unwrap_or_else(|| ".audio".to_string());
        let byte_count = bytes.len();

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            std::fs::create_dir_all(&dir)?;
            let mut file = tempfile::Builder::new()
                .prefix("reprise-")
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| AcquisitionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        self.live.fetch_add(1, Ordering::SeqCst);
        debug!(
            path = %file.path().display(),
            bytes = byte_count,
            locator = %source.locator,
            "Temporary audio staged"
        );

        Ok(TempAudio {
            file: Some(file),
            live: Arc::clone(&self.live),
        })
    }
}

/// Scoped guard for one staged audio file
#[derive(Debug)]
pub struct TempAudio {
    file: Option<NamedTempFile>,
    live: Arc<AtomicUsize>,
}

impl TempAudio {
    /// Path of the staged file (valid until release)
    pub fn path(&self) -> &Path {
        self.file
            .as_ref()
            .map(|f| f.path())
            .unwrap_or_else(|| Path::new(""))
    }

    /// Remove the file now
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        let path = file.path().to_path_buf();

        match file.close() {
            Ok(()) => debug!(path = %path.display(), "Temporary audio removed"),
            Err(source) => {
                let error = ResourceCleanupError { path, source };
                warn!(error = %error, "Temporary audio cleanup failed");
            }
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        self.remove();
    }
}
