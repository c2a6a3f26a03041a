//! Event types for the Reprise event system
//!
//! Provides the scan progress events and the `EventBus` used to fan them out
//! to SSE clients and any other in-process listener.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Scan progress events
///
/// Events are broadcast via `EventBus` and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// A scan episode began running
    ScanStarted {
        job_id: Uuid,
        query: String,
        result_cap: usize,
        timestamp: DateTime<Utc>,
    },

    /// Candidate list obtained from discovery
    CandidatesDiscovered {
        job_id: Uuid,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A candidate was fingerprinted, scored and classified
    CandidateProcessed {
        job_id: Uuid,
        title: String,
        link: String,
        similarity: f64,
        matched: bool,
        processed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// A candidate could not be acquired or fingerprinted
    CandidateSkipped {
        job_id: Uuid,
        title: String,
        link: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A scan episode returned to idle
    ScanFinished {
        job_id: Uuid,
        /// "completed", "aborted" or "cancelled"
        outcome: String,
        matched: usize,
        non_matched: usize,
        skipped: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ScanEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            ScanEvent::ScanStarted { .. } => "ScanStarted",
            ScanEvent::CandidatesDiscovered { .. } => "CandidatesDiscovered",
            ScanEvent::CandidateProcessed { .. } => "CandidateProcessed",
            ScanEvent::CandidateSkipped { .. } => "CandidateSkipped",
            ScanEvent::ScanFinished { .. } => "ScanFinished",
        }
    }

    /// Job the event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            ScanEvent::ScanStarted { job_id, .. }
            | ScanEvent::CandidatesDiscovered { job_id, .. }
            | ScanEvent::CandidateProcessed { job_id, .. }
            | ScanEvent::CandidateSkipped { job_id, .. }
            | ScanEvent::ScanFinished { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast bus for scan events
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: ScanEvent) -> Result<usize, broadcast::error::SendError<ScanEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let job_id = Uuid::new_v4();

        bus.emit(ScanEvent::CandidatesDiscovered {
            job_id,
            count: 3,
            timestamp: Utc::now(),
        })
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "CandidatesDiscovered");
        assert_eq!(event.job_id(), job_id);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        let event = ScanEvent::ScanStarted {
            job_id: Uuid::new_v4(),
            query: "q".to_string(),
            result_cap: 1,
            timestamp: Utc::now(),
        };

        assert!(bus.emit(event.clone()).is_err());
        // Lossy emission never fails
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 10);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ScanEvent::CandidateSkipped {
            job_id: Uuid::nil(),
            title: "clip".to_string(),
            link: "https://example.com/clip".to_string(),
            reason: "timeout".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CandidateSkipped");
        assert_eq!(json["reason"], "timeout");
    }
}
