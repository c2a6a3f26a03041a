//! Audio acquisition
//!
//! An [`AudioFetcher`] turns a locator into raw (usually compressed) audio
//! bytes. [`RoutingFetcher`] picks the adapter by locator shape:
//! - `upload:<name>` → [`StagedFileFetcher`] (files staged via `POST /uploads`)
//! - http(s) URL ending in a media extension → [`HttpFetcher`]
//! - any other http(s) URL → [`YtDlpFetcher`]

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Locator prefix for staged uploads
pub const UPLOAD_PREFIX: &str = "upload:";

/// Extensions served directly over HTTP rather than through yt-dlp
///
/// Only containers the decoder can read; Opus (`.opus`, usually `.webm`)
/// has no decoder and goes through yt-dlp format selection instead.
const DIRECT_MEDIA_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "flac", "wav", "ogg", "oga", "mp4"];

/// yt-dlp format selector: best audio in a codec the decoder supports
///
/// Platforms default to WebM/Opus, so AAC (`mp4a`) is preferred, then any
/// non-Opus audio-only stream, then a combined AAC stream.
pub const DOWNLOAD_FORMAT: &str =
    "bestaudio[acodec^=mp4a]/bestaudio[ext=m4a]/bestaudio[acodec!=opus]/best[acodec^=mp4a]";

const USER_AGENT: &str = concat!("reprise-scan/", env!("CARGO_PKG_VERSION"));

/// Acquisition failures
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Acquisition timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Downloader failed: {0}")]
    Process(String),

    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Unsupported locator: {0}")]
    InvalidLocator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio acquisition collaborator
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Raw audio bytes behind `locator`
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, AcquisitionError>;
}

/// Downloads best-quality audio through the `yt-dlp` executable
pub struct YtDlpFetcher {
    program: String,
    cookies_file: Option<PathBuf>,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<String>, cookies_file: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cookies_file,
        }
    }

    fn command_args(&self, locator: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "--format",
            DOWNLOAD_FORMAT,
            "--no-playlist",
            "--quiet",
            "--no-warnings",
            "--output",
            "-",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        args.push("--".to_string());
        args.push(locator.to_string());
        args
    }
}

#[async_trait]
impl AudioFetcher for YtDlpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, AcquisitionError> {
        debug!(program = %self.program, locator, "Spawning downloader");

        // kill_on_drop: a timed-out acquisition must not leave the child running
        let output = tokio::process::Command::new(&self.program)
            .args(self.command_args(locator))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    AcquisitionError::Process(format!("{} not found on PATH", self.program))
                }
                _ => AcquisitionError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().last().unwrap_or("no diagnostics").trim().to_string();
            return Err(AcquisitionError::Process(format!("{} ({})", reason, output.status)));
        }

        if output.stdout.is_empty() {
            return Err(AcquisitionError::Process("downloader produced no audio".to_string()));
        }

        debug!(locator, bytes = output.stdout.len(), "Downloader finished");
        Ok(output.stdout)
    }
}

/// Plain HTTP GET for direct media URLs
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, AcquisitionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AcquisitionError::Http(e.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl AudioFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, AcquisitionError> {
        let response = self
            .http_client
            .get(locator)
            .send()
            .await
            .map_err(|e| AcquisitionError::Http(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AcquisitionError::NotFound(locator.to_string()));
        }
        if !status.is_success() {
            return Err(AcquisitionError::Http(format!("{} returned {}", locator, status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AcquisitionError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Reads clips previously staged in the uploads directory
pub struct StagedFileFetcher {
    uploads_dir: PathBuf,
}

impl StagedFileFetcher {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Path of a staged upload; rejects names that could escape the directory
    pub fn resolve(&self, locator: &str) -> Result<PathBuf, AcquisitionError> {
        let name = locator
            .strip_prefix(UPLOAD_PREFIX)
            .ok_or_else(|| AcquisitionError::InvalidLocator(locator.to_string()))?;

        if !is_safe_file_name(name) {
            return Err(AcquisitionError::InvalidLocator(locator.to_string()));
        }
        Ok(self.uploads_dir.join(name))
    }
}

/// Single path component without traversal or hidden-file tricks
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().map(|n| n == name).unwrap_or(false)
}

#[async_trait]
impl AudioFetcher for StagedFileFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, AcquisitionError> {
        let path = self.resolve(locator)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AcquisitionError::NotFound(locator.to_string()))
            }
            Err(e) => Err(AcquisitionError::Io(e)),
        }
    }
}

/// Dispatches each locator to the adapter that can serve it
pub struct RoutingFetcher {
    staged: Arc<dyn AudioFetcher>,
    direct: Arc<dyn AudioFetcher>,
    downloader: Arc<dyn AudioFetcher>,
}

impl RoutingFetcher {
    pub fn new(
        staged: Arc<dyn AudioFetcher>,
        direct: Arc<dyn AudioFetcher>,
        downloader: Arc<dyn AudioFetcher>,
    ) -> Self {
        Self {
            staged,
            direct,
            downloader,
        }
    }

    fn route(&self, locator: &str) -> Result<&Arc<dyn AudioFetcher>, AcquisitionError> {
        if locator.starts_with(UPLOAD_PREFIX) {
            return Ok(&self.staged);
        }
        if !(locator.starts_with("http://") || locator.starts_with("https://")) {
            return Err(AcquisitionError::InvalidLocator(locator.to_string()));
        }
        if is_direct_media_url(locator) {
            Ok(&self.direct)
        } else {
            Ok(&self.downloader)
        }
    }
}

#[async_trait]
impl AudioFetcher for RoutingFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, AcquisitionError> {
        self.route(locator)?.fetch(locator).await
    }
}

fn is_direct_media_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let Some(scheme_end) = path.find("://") else {
        return false;
    };
    let Some((_, file)) = path[scheme_end + 3..].rsplit_once('/') else {
        return false;
    };
    file.rsplit_once('.')
        .map(|(_, ext)| DIRECT_MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tagged {
        calls: AtomicUsize,
        tag: u8,
    }

    #[async_trait]
    impl AudioFetcher for Tagged {
        async fn fetch(&self, _locator: &str) -> Result<Vec<u8>, AcquisitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.tag])
        }
    }

    fn tagged(tag: u8) -> Arc<Tagged> {
        Arc::new(Tagged {
            calls: AtomicUsize::new(0),
            tag,
        })
    }

    #[tokio::test]
    async fn test_routing_by_locator() {
        let (staged, direct, downloader) = (tagged(1), tagged(2), tagged(3));
        let router = RoutingFetcher::new(staged.clone(), direct.clone(), downloader.clone());

        assert_eq!(router.fetch("upload:ref.wav").await.unwrap(), vec![1]);
        assert_eq!(router.fetch("https://cdn.example.com/x/track.MP3?t=1").await.unwrap(), vec![2]);
        assert_eq!(router.fetch("https://www.youtube.com/watch?v=abc").await.unwrap(), vec![3]);
        assert!(matches!(
            router.fetch("ftp://example.com/a.mp3").await,
            Err(AcquisitionError::InvalidLocator(_))
        ));
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_staged_names_cannot_escape() {
        let fetcher = StagedFileFetcher::new("/srv/uploads");
        assert_eq!(
            fetcher.resolve("upload:clip.wav").unwrap(),
            PathBuf::from("/srv/uploads/clip.wav")
        );
        for bad in ["upload:../etc/passwd", "upload:", "upload:.hidden", "upload:a/b.wav", "clip.wav"] {
            assert!(fetcher.resolve(bad).is_err(), "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_staged_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.wav"), b"RIFF").unwrap();
        let fetcher = StagedFileFetcher::new(dir.path());

        assert_eq!(fetcher.fetch("upload:clip.wav").await.unwrap(), b"RIFF".to_vec());
        assert!(matches!(
            fetcher.fetch("upload:missing.wav").await,
            Err(AcquisitionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_downloader_binary() {
        let fetcher = YtDlpFetcher::new("reprise-no-such-downloader", None);
        let result = fetcher.fetch("https://www.youtube.com/watch?v=abc").await;
        assert!(matches!(result, Err(AcquisitionError::Process(_))));
    }

    #[test]
    fn test_downloader_args_include_cookies() {
        let fetcher = YtDlpFetcher::new("yt-dlp", Some(PathBuf::from("/etc/cookies.txt")));
        let args = fetcher.command_args("https://www.youtube.com/watch?v=abc");
        assert!(args.windows(2).any(|w| w[0] == "--cookies" && w[1] == "/etc/cookies.txt"));
        assert_eq!(args.last().map(String::as_str), Some("https://www.youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_downloader_avoids_opus() {
        let fetcher = YtDlpFetcher::new("yt-dlp", None);
        let args = fetcher.command_args("https://www.youtube.com/watch?v=abc");

        let format = args
            .windows(2)
            .find(|w| w[0] == "--format")
            .map(|w| w[1].as_str())
            .unwrap();
        assert_eq!(format, DOWNLOAD_FORMAT);
        assert!(format.starts_with("bestaudio[acodec^=mp4a]"));
        assert!(!format.split('/').any(|alt| alt == "bestaudio" || alt == "best"));
    }

    #[test]
    fn test_undecodable_direct_media_goes_to_downloader() {
        assert!(is_direct_media_url("https://cdn.example.com/a/clip.m4a"));
        assert!(!is_direct_media_url("https://cdn.example.com/a/clip.opus"));
        assert!(!is_direct_media_url("https://cdn.example.com/a/clip.webm"));
    }
}
