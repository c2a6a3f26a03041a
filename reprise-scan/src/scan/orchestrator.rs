//! Scan episode orchestration
//!
//! Drives one episode end to end:
//! 1. Discover candidates (capped at `result_cap`); none → abort
//! 2. Acquire and fingerprint the reference; failure → abort
//! 3. For each candidate in discovery order: check cancellation, acquire,
//!    fingerprint (blocking pool), score, classify, publish a snapshot.
//!    Candidate failures are recorded as skipped and the loop continues.
//! 4. Transition to IDLE with the outcome
//!
//! Snapshots are published through a `watch` channel owned by the episode;
//! observers never see a partially updated job.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use reprise_common::config::ScanSettings;
use reprise_common::events::{EventBus, ScanEvent};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::{ScanOutcome, ScanRequest, ScanResult, ScanSnapshot, SkippedCandidate};
use super::resources::TempResourceManager;
use super::ScanError;
use crate::audio::{load_waveform_from_file, LoadOptions};
use crate::config::ConfigurationError;
use crate::fingerprint::{FeatureExtractor, Fingerprint};
use crate::similarity::{fingerprint_similarity, MatchClassifier};
use crate::sources::{AudioFetcher, AudioSource, VideoDiscovery};

/// Shared scan pipeline: collaborators plus analysis settings
#[derive(Clone)]
pub struct ScanOrchestrator {
    discovery: Arc<dyn VideoDiscovery>,
    fetcher: Arc<dyn AudioFetcher>,
    resources: TempResourceManager,
    extractor: FeatureExtractor,
    classifier: MatchClassifier,
    load_options: LoadOptions,
    settings: ScanSettings,
    event_bus: EventBus,
}

/// Marks the job IDLE if the episode ends without doing so (panic, abort)
struct EpisodeGuard {
    tx: watch::Sender<ScanSnapshot>,
}

impl Drop for EpisodeGuard {
    fn drop(&mut self) {
        if self.tx.borrow().is_running() {
            error!(job_id = %self.tx.borrow().job_id, "Scan episode terminated unexpectedly");
            self.tx.send_modify(|s| {
                s.finish(ScanOutcome::Aborted {
                    reason: "episode terminated unexpectedly".to_string(),
                })
            });
        }
    }
}

impl ScanOrchestrator {
    pub fn new(
        discovery: Arc<dyn VideoDiscovery>,
        fetcher: Arc<dyn AudioFetcher>,
        resources: TempResourceManager,
        settings: &ScanSettings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            discovery,
            fetcher,
            resources,
            extractor: FeatureExtractor::new(settings.segment_duration_secs),
            classifier: MatchClassifier::new(settings.similarity_threshold),
            load_options: LoadOptions {
                fragment_duration_secs: settings.fragment_duration_secs,
                target_sample_rate: settings.analysis_sample_rate,
                ..Default::default()
            },
            settings: settings.clone(),
            event_bus,
        }
    }

    pub fn resources(&self) -> &TempResourceManager {
        &self.resources
    }

    pub fn classifier(&self) -> &MatchClassifier {
        &self.classifier
    }

    /// Settings and collaborator readiness, checked before a job is registered
    pub fn ensure_configured(&self) -> Result<(), ConfigurationError> {
        self.settings
            .validate()
            .map_err(|e| ConfigurationError::Invalid(e.to_string()))?;
        self.discovery.ensure_configured()
    }

    /// Run one episode to completion, publishing snapshots through `tx`
    pub async fn run_episode(
        &self,
        request: ScanRequest,
        cancel: CancellationToken,
        tx: watch::Sender<ScanSnapshot>,
    ) -> ScanOutcome {
        let job_id = tx.borrow().job_id;
        let guard = EpisodeGuard { tx };
        let started = Instant::now();

        info!(
            job_id = %job_id,
            query = %request.query,
            result_cap = request.result_cap,
            reference = %request.reference_locator,
            "Scan episode started"
        );
        self.event_bus.emit_lossy(ScanEvent::ScanStarted {
            job_id,
            query: request.query.clone(),
            result_cap: request.result_cap,
            timestamp: Utc::now(),
        });

        let outcome = self.execute(job_id, &request, &cancel, &guard.tx).await;

        guard.tx.send_modify(|s| s.finish(outcome.clone()));

        let snapshot = guard.tx.borrow().clone();
        let duration_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            ScanOutcome::Aborted { reason } => {
                warn!(job_id = %job_id, reason = %reason, "Scan episode aborted")
            }
            _ => info!(
                job_id = %job_id,
                outcome = outcome.as_str(),
                matched = snapshot.matched.len(),
                non_matched = snapshot.non_matched.len(),
                skipped = snapshot.skipped.len(),
                duration_ms,
                "Scan episode finished"
            ),
        }

        self.event_bus.emit_lossy(ScanEvent::ScanFinished {
            job_id,
            outcome: outcome.as_str().to_string(),
            matched: snapshot.matched.len(),
            non_matched: snapshot.non_matched.len(),
            skipped: snapshot.skipped.len(),
            duration_ms,
            timestamp: Utc::now(),
        });

        outcome
    }

    async fn execute(
        &self,
        job_id: Uuid,
        request: &ScanRequest,
        cancel: &CancellationToken,
        tx: &watch::Sender<ScanSnapshot>,
    ) -> ScanOutcome {
        // Step 1: candidate discovery
        let search = self.discovery.search(&request.query, request.result_cap);
        let mut candidates = match tokio::time::timeout(self.resources.fetch_timeout(), search).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => return aborted(format!("discovery failed: {}", e)),
            Err(_) => return aborted("discovery timed out".to_string()),
        };
        candidates.truncate(request.result_cap);

        if candidates.is_empty() {
            return aborted("no candidates".to_string());
        }

        info!(job_id = %job_id, count = candidates.len(), "Candidates discovered");
        tx.send_modify(|s| s.candidates_total = candidates.len());
        self.event_bus.emit_lossy(ScanEvent::CandidatesDiscovered {
            job_id,
            count: candidates.len(),
            timestamp: Utc::now(),
        });

        if cancel.is_cancelled() {
            return ScanOutcome::Cancelled;
        }

        // Step 2-3: reference fingerprint
        let reference_source = AudioSource::from_locator(request.reference_locator.clone());
        let reference = match self.fingerprint_source(&reference_source).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => return aborted(format!("reference unusable: {}", e)),
        };
        debug!(job_id = %job_id, "Reference fingerprint ready");

        // Step 4: candidates in discovery order
        let total = candidates.len();
        for candidate in &candidates {
            if cancel.is_cancelled() {
                info!(job_id = %job_id, "Scan cancelled");
                return ScanOutcome::Cancelled;
            }

            let scored = match self.fingerprint_source(candidate).await {
                Ok(fingerprint) => fingerprint_similarity(&reference, &fingerprint).map_err(ScanError::from),
                Err(e) => Err(e),
            };

            match scored {
                Ok(similarity) => {
                    let verdict = self.classifier.classify(similarity);
                    let result = ScanResult {
                        title: candidate.title.clone(),
                        link: candidate.locator.clone(),
                        similarity,
                        verdict,
                    };
                    debug!(
                        job_id = %job_id,
                        title = %candidate.title,
                        similarity,
                        verdict = ?verdict,
                        "Candidate classified"
                    );
                    tx.send_modify(|s| s.record_result(result));

                    let processed = tx.borrow().candidates_processed;
                    self.event_bus.emit_lossy(ScanEvent::CandidateProcessed {
                        job_id,
                        title: candidate.title.clone(),
                        link: candidate.locator.clone(),
                        similarity,
                        matched: verdict == crate::similarity::MatchVerdict::Match,
                        processed,
                        total,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    let reason = e.to_string();
                    warn!(
                        job_id = %job_id,
                        title = %candidate.title,
                        link = %candidate.locator,
                        reason = %reason,
                        "Skipping candidate"
                    );
                    tx.send_modify(|s| {
                        s.record_skip(SkippedCandidate {
                            title: candidate.title.clone(),
                            link: candidate.locator.clone(),
                            reason: reason.clone(),
                        })
                    });
                    self.event_bus.emit_lossy(ScanEvent::CandidateSkipped {
                        job_id,
                        title: candidate.title.clone(),
                        link: candidate.locator.clone(),
                        reason,
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        ScanOutcome::Completed
    }

    /// Acquire, decode and fingerprint one source
    ///
    /// The staged file is released on every path out of this function.
    pub async fn fingerprint_source(&self, source: &AudioSource) -> Result<Fingerprint, ScanError> {
        let audio = self.resources.acquire(source, self.fetcher.as_ref()).await?;

        let path = audio.path().to_path_buf();
        let options = self.load_options.clone();
        let extractor = self.extractor.clone();

        let extracted = tokio::task::spawn_blocking(move || {
            let waveform = load_waveform_from_file(&path, &options)?;
            Ok::<_, ScanError>(extractor.extract(&waveform))
        })
        .await;

        audio.release();

        let fingerprint = extracted.map_err(|e| ScanError::Internal(format!("extraction task failed: {}", e)))??;
        if fingerprint.is_sentinel() {
            return Err(ScanError::EmptyFingerprint);
        }
        Ok(fingerprint)
    }
}

fn aborted(reason: String) -> ScanOutcome {
    ScanOutcome::Aborted { reason }
}
