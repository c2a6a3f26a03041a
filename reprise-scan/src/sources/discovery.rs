//! Video discovery
//!
//! YouTube Data API v3 search (`part=snippet`, `type=video`). The API key is
//! optional at construction time; a missing key surfaces as a
//! [`ConfigurationError`] when a scan is requested.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::AudioSource;
use crate::config::ConfigurationError;

const YOUTUBE_SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";
const USER_AGENT: &str = concat!("reprise-scan/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest page the search API returns
pub const MAX_RESULTS_PER_QUERY: usize = 50;

/// Discovery failures
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Candidate discovery collaborator
#[async_trait]
pub trait VideoDiscovery: Send + Sync {
    /// Fail fast when the collaborator cannot run (e.g. missing credential)
    fn ensure_configured(&self) -> Result<(), ConfigurationError>;

    /// Up to `max_results` candidates for `query`, in relevance order
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<AudioSource>, DiscoveryError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
}

/// YouTube Data API search client
pub struct YouTubeSearchClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl YouTubeSearchClient {
    pub fn new(api_key: Option<String>) -> Result<Self, DiscoveryError> {
        Self::with_base_url(api_key, YOUTUBE_SEARCH_URL)
    }

    /// Client against a different endpoint (self-hosted proxy, tests)
    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, DiscoveryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: api_key.filter(|k| crate::config::is_valid_key(k)),
            base_url: base_url.into(),
        })
    }

    fn api_key(&self) -> Result<&str, ConfigurationError> {
        self.api_key.as_deref().ok_or_else(|| {
            ConfigurationError::MissingCredential("discovery API key is not configured".to_string())
        })
    }
}

#[async_trait]
impl VideoDiscovery for YouTubeSearchClient {
    fn ensure_configured(&self) -> Result<(), ConfigurationError> {
        self.api_key().map(|_| ())
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<AudioSource>, DiscoveryError> {
        let api_key = self.api_key()?;
        let max_results = max_results.clamp(1, MAX_RESULTS_PER_QUERY).to_string();

        let params = [
            ("part", "snippet"),
            ("q", query),
            ("type", "video"),
            ("maxResults", max_results.as_str()),
            ("key", api_key),
        ];

        debug!(query, max_results = %max_results, "Querying video search API");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Api(status.as_u16(), body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(e.to_string()))?;

        let sources: Vec<AudioSource> = parsed
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                let locator = format!("{}{}", WATCH_URL_PREFIX, video_id);
                Some(AudioSource::new(video_id, item.snippet.title, locator))
            })
            .collect();

        debug!(count = sources.len(), "Search returned candidates");
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_configuration_error() {
        let client = YouTubeSearchClient::new(None).unwrap();
        assert!(matches!(
            client.ensure_configured(),
            Err(ConfigurationError::MissingCredential(_))
        ));

        let blank = YouTubeSearchClient::new(Some("  ".to_string())).unwrap();
        assert!(blank.ensure_configured().is_err());
    }

    #[tokio::test]
    async fn test_search_without_key_fails_before_network() {
        let client = YouTubeSearchClient::with_base_url(None, "http://127.0.0.1:9/unused").unwrap();
        let result = client.search("song", 3).await;
        assert!(matches!(result, Err(DiscoveryError::Configuration(_))));
    }

    #[test]
    fn test_parse_search_response() {
        let json = r#"{
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc123"}, "snippet": {"title": "Cover"}},
                {"id": {"kind": "youtube#channel"}, "snippet": {"title": "Channel"}}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].id.video_id.as_deref(), Some("abc123"));
        assert!(parsed.items[1].id.video_id.is_none());
    }
}
