//! In-process collaborators for scan tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reprise_common::config::ScanSettings;
use reprise_common::events::EventBus;
use reprise_scan::config::ConfigurationError;
use reprise_scan::scan::{ScanOrchestrator, ScanRegistry, TempResourceManager};
use reprise_scan::sources::{AcquisitionError, AudioFetcher, AudioSource, DiscoveryError, VideoDiscovery};

/// Discovery returning a fixed candidate list
pub struct FakeDiscovery {
    pub candidates: Vec<AudioSource>,
    pub configured: bool,
    pub searches: AtomicUsize,
}

impl FakeDiscovery {
    pub fn with(candidates: Vec<AudioSource>) -> Self {
        Self {
            candidates,
            configured: true,
            searches: AtomicUsize::new(0),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            candidates: Vec::new(),
            configured: false,
            searches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VideoDiscovery for FakeDiscovery {
    fn ensure_configured(&self) -> Result<(), ConfigurationError> {
        if self.configured {
            Ok(())
        } else {
            Err(ConfigurationError::MissingCredential("discovery API key".to_string()))
        }
    }

    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<AudioSource>, DiscoveryError> {
        self.ensure_configured()?;
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.iter().take(max_results).cloned().collect())
    }
}

/// What the fake fetcher does for one locator
#[derive(Clone)]
pub enum FetchBehavior {
    Bytes(Vec<u8>),
    Fail,
    Delayed(Duration, Vec<u8>),
    Stall,
}

/// Locator-keyed fetcher; unknown locators are NotFound
#[derive(Default)]
pub struct FakeFetcher {
    behaviors: HashMap<String, FetchBehavior>,
    pub fetches: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, locator: &str, behavior: FetchBehavior) -> Self {
        self.behaviors.insert(locator.to_string(), behavior);
        self
    }
}

#[async_trait]
impl AudioFetcher for FakeFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, AcquisitionError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.behaviors.get(locator).cloned() {
            Some(FetchBehavior::Bytes(bytes)) => Ok(bytes),
            Some(FetchBehavior::Fail) => Err(AcquisitionError::Http(format!("{} returned 503", locator))),
            Some(FetchBehavior::Delayed(delay, bytes)) => {
                tokio::time::sleep(delay).await;
                Ok(bytes)
            }
            Some(FetchBehavior::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            None => Err(AcquisitionError::NotFound(locator.to_string())),
        }
    }
}

/// Everything a scan test needs to drive and inspect a registry
pub struct Pipeline {
    pub registry: ScanRegistry,
    pub resources: TempResourceManager,
    pub event_bus: EventBus,
}

pub fn build_pipeline(
    discovery: Arc<dyn VideoDiscovery>,
    fetcher: Arc<dyn AudioFetcher>,
    temp_dir: &Path,
    fetch_timeout: Duration,
    settings: &ScanSettings,
) -> Pipeline {
    let event_bus = EventBus::new(100);
    let resources = TempResourceManager::new(temp_dir, fetch_timeout);
    let orchestrator = ScanOrchestrator::new(discovery, fetcher, resources.clone(), settings, event_bus.clone());
    Pipeline {
        registry: ScanRegistry::new(orchestrator, settings),
        resources,
        event_bus,
    }
}
