//! Scan job state
//!
//! State machine per job: RUNNING → IDLE, with an outcome recorded on the
//! transition. Results are appended in discovery order and never modified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ScanError;
use crate::similarity::MatchVerdict;

/// Scan request as accepted by the job control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Free-text discovery query
    pub query: String,
    /// Maximum number of candidates to examine (≥ 1)
    pub result_cap: usize,
    /// Locator of the reference clip
    pub reference_locator: String,
}

impl ScanRequest {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.query.trim().is_empty() {
            return Err(ScanError::InvalidInput("query must not be empty".to_string()));
        }
        if self.result_cap == 0 {
            return Err(ScanError::InvalidInput("result_cap must be at least 1".to_string()));
        }
        if self.reference_locator.trim().is_empty() {
            return Err(ScanError::InvalidInput(
                "reference_locator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanState {
    /// Episode in progress
    Running,
    /// Episode finished (see outcome)
    Idle,
}

/// How an episode ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScanOutcome {
    /// Every candidate was examined
    Completed,
    /// Episode stopped before examining candidates
    Aborted { reason: String },
    /// Cancellation requested; remaining candidates not examined
    Cancelled,
}

impl ScanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutcome::Completed => "completed",
            ScanOutcome::Aborted { .. } => "aborted",
            ScanOutcome::Cancelled => "cancelled",
        }
    }
}

/// One classified candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub title: String,
    pub link: String,
    pub similarity: f64,
    pub verdict: MatchVerdict,
}

/// A candidate that produced no fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub title: String,
    pub link: String,
    pub reason: String,
}

/// Immutable view of a job at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub job_id: Uuid,
    pub query: String,
    pub reference_locator: String,
    pub result_cap: usize,
    pub state: ScanState,
    /// Present once the job is IDLE
    pub outcome: Option<ScanOutcome>,
    pub matched: Vec<ScanResult>,
    pub non_matched: Vec<ScanResult>,
    pub skipped: Vec<SkippedCandidate>,
    pub candidates_total: usize,
    pub candidates_processed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanSnapshot {
    /// Fresh RUNNING job
    pub fn new(job_id: Uuid, request: &ScanRequest) -> Self {
        Self {
            job_id,
            query: request.query.clone(),
            reference_locator: request.reference_locator.clone(),
            result_cap: request.result_cap,
            state: ScanState::Running,
            outcome: None,
            matched: Vec::new(),
            non_matched: Vec::new(),
            skipped: Vec::new(),
            candidates_total: 0,
            candidates_processed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ScanState::Running
    }

    /// Append a classified candidate to the list matching its verdict
    pub fn record_result(&mut self, result: ScanResult) {
        self.candidates_processed += 1;
        match result.verdict {
            MatchVerdict::Match => self.matched.push(result),
            MatchVerdict::NoMatch => self.non_matched.push(result),
        }
    }

    pub fn record_skip(&mut self, skipped: SkippedCandidate) {
        self.candidates_processed += 1;
        self.skipped.push(skipped);
    }

    /// Transition to IDLE; only the first call has an effect
    pub fn finish(&mut self, outcome: ScanOutcome) {
        if !self.is_running() {
            return;
        }
        self.state = ScanState::Idle;
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            job_id: self.job_id,
            query: self.query.clone(),
            state: self.state,
            outcome: self.outcome.clone(),
            matched: self.matched.len(),
            non_matched: self.non_matched.len(),
            skipped: self.skipped.len(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Compact job listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub job_id: Uuid,
    pub query: String,
    pub state: ScanState,
    pub outcome: Option<ScanOutcome>,
    pub matched: usize,
    pub non_matched: usize,
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
