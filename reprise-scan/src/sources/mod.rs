//! External collaborators: video discovery and audio acquisition
//!
//! Both sit behind traits so the scan pipeline can run against the real
//! YouTube/yt-dlp adapters or in-process fakes.

pub mod discovery;
pub mod fetch;

use serde::{Deserialize, Serialize};

pub use discovery::{DiscoveryError, VideoDiscovery, YouTubeSearchClient};
pub use fetch::{
    AcquisitionError, AudioFetcher, HttpFetcher, RoutingFetcher, StagedFileFetcher, YtDlpFetcher,
};

/// A discovered (or reference) audio source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    /// Platform identifier (video id, upload name, ...)
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Opaque locator handed to the fetcher (URL or `upload:<name>`)
    pub locator: String,
}

impl AudioSource {
    pub fn new(id: impl Into<String>, title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            locator: locator.into(),
        }
    }

    /// Source for a bare locator (used for the scan reference)
    pub fn from_locator(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        Self {
            id: locator.clone(),
            title: "reference".to_string(),
            locator,
        }
    }

    /// File extension implied by the locator path, if it looks like one
    pub fn extension_hint(&self) -> Option<&str> {
        let path = self
            .locator
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.locator);
        let name = path.rsplit(['/', ':']).next()?;
        let (_, ext) = name.rsplit_once('.')?;
        let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then_some(ext)
    }
}
