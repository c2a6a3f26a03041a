//! Scan job registry
//!
//! Bounded pool of scan jobs keyed by job id. Requests beyond
//! `max_concurrent_scans` running jobs are rejected with [`ScanError::Busy`]
//! rather than queued. Finished jobs stay queryable until they fall out of
//! the `job_history` window, enforced on submit and whenever an episode
//! finishes.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use reprise_common::config::ScanSettings;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::job::{ScanRequest, ScanSnapshot, ScanSummary};
use super::orchestrator::ScanOrchestrator;
use super::ScanError;

struct JobEntry {
    snapshot: watch::Receiver<ScanSnapshot>,
    cancel: CancellationToken,
}

impl JobEntry {
    fn is_running(&self) -> bool {
        self.snapshot.borrow().is_running()
    }
}

#[derive(Default)]
struct RegistryInner {
    jobs: HashMap<Uuid, JobEntry>,
    /// Job ids, oldest first
    order: VecDeque<Uuid>,
}

impl RegistryInner {
    fn running_count(&self) -> usize {
        self.jobs.values().filter(|j| j.is_running()).count()
    }

    /// Drop the oldest finished jobs beyond `history`
    fn prune(&mut self, history: usize) {
        let mut finished = self.order.iter().filter(|id| !self.is_running(id)).count();
        if finished <= history {
            return;
        }

        let mut retained = VecDeque::with_capacity(self.order.len());
        while let Some(id) = self.order.pop_front() {
            if finished > history && !self.is_running(&id) {
                self.jobs.remove(&id);
                finished -= 1;
                debug!(job_id = %id, "Evicted finished scan from history");
            } else {
                retained.push_back(id);
            }
        }
        self.order = retained;
    }

    fn is_running(&self, id: &Uuid) -> bool {
        self.jobs.get(id).map(JobEntry::is_running).unwrap_or(false)
    }
}

/// Registry of scan jobs
#[derive(Clone)]
pub struct ScanRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    orchestrator: ScanOrchestrator,
    max_concurrent: usize,
    history: usize,
}

impl ScanRegistry {
    pub fn new(orchestrator: ScanOrchestrator, settings: &ScanSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner::default())),
            orchestrator,
            max_concurrent: settings.max_concurrent_scans.max(1),
            history: settings.job_history,
        }
    }

    pub fn orchestrator(&self) -> &ScanOrchestrator {
        &self.orchestrator
    }

    /// Validate, register and spawn a scan; returns the new job id
    ///
    /// Configuration errors and capacity are checked before anything is
    /// registered, so a rejected request leaves no trace.
    pub async fn submit(&self, request: ScanRequest) -> Result<Uuid, ScanError> {
        request.validate()?;
        self.orchestrator.ensure_configured()?;

        let job_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(ScanSnapshot::new(job_id, &request));
        let cancel = CancellationToken::new();

        {
            let mut inner = self.inner.write().await;
            let running = inner.running_count();
            if running >= self.max_concurrent {
                return Err(ScanError::Busy { running });
            }

            inner.jobs.insert(
                job_id,
                JobEntry {
                    snapshot: rx,
                    cancel: cancel.clone(),
                },
            );
            inner.order.push_back(job_id);
            inner.prune(self.history);
        }

        info!(job_id = %job_id, query = %request.query, "Scan job registered");

        let orchestrator = self.orchestrator.clone();
        let registry = self.clone();
        tokio::spawn(async move {
            debug!(job_id = %job_id, "Background scan task started");
            orchestrator.run_episode(request, cancel, tx).await;
            registry.prune_finished().await;
        });

        Ok(job_id)
    }

    /// Latest snapshot of one job
    pub async fn get(&self, job_id: Uuid) -> Option<ScanSnapshot> {
        let inner = self.inner.read().await;
        inner.jobs.get(&job_id).map(|j| j.snapshot.borrow().clone())
    }

    /// Snapshot of the most recently submitted job
    pub async fn latest(&self) -> Option<ScanSnapshot> {
        let inner = self.inner.read().await;
        inner
            .order
            .back()
            .and_then(|id| inner.jobs.get(id))
            .map(|j| j.snapshot.borrow().clone())
    }

    /// Summaries of known jobs, newest first
    pub async fn list(&self) -> Vec<ScanSummary> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.jobs.get(id))
            .map(|j| j.snapshot.borrow().summary())
            .collect()
    }

    pub async fn running_count(&self) -> usize {
        self.inner.read().await.running_count()
    }

    /// Signal cancellation; the episode stops before its next candidate
    ///
    /// Returns the snapshot at the time of the request. Cancelling a
    /// finished job is a no-op.
    pub async fn cancel(&self, job_id: Uuid) -> Result<ScanSnapshot, ScanError> {
        let inner = self.inner.read().await;
        let entry = inner.jobs.get(&job_id).ok_or(ScanError::NotFound(job_id))?;

        if entry.is_running() {
            entry.cancel.cancel();
            info!(job_id = %job_id, "Scan cancellation requested");
        }
        let snapshot = entry.snapshot.borrow().clone();
        Ok(snapshot)
    }

    /// Wait until the job is IDLE and return its final snapshot
    pub async fn wait_until_idle(&self, job_id: Uuid) -> Option<ScanSnapshot> {
        let mut rx = {
            let inner = self.inner.read().await;
            inner.jobs.get(&job_id)?.snapshot.clone()
        };

        if rx.wait_for(|s| !s.is_running()).await.is_err() {
            // Sender gone: the last published value is final
            debug!(job_id = %job_id, "Scan episode sender dropped");
        }
        let snapshot = rx.borrow().clone();

        // History bound holds once the caller observes IDLE
        self.prune_finished().await;
        Some(snapshot)
    }

    /// Enforce the `job_history` bound on finished jobs
    pub async fn prune_finished(&self) {
        self.inner.write().await.prune(self.history);
    }
}
