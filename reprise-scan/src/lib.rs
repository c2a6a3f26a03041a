//! reprise-scan library interface
//!
//! Audio reuse detection: decode a reference clip and a set of discovered
//! candidates, fingerprint each one and flag candidates whose fingerprint is
//! nearly identical to the reference.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod scan;
pub mod similarity;
pub mod sources;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use reprise_common::config::ScratchDirs;
use reprise_common::events::EventBus;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::scan::ScanRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Scan jobs, running and finished
    pub registry: ScanRegistry,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Upload and transient-audio directories
    pub scratch: ScratchDirs,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(registry: ScanRegistry, event_bus: EventBus, scratch: ScratchDirs) -> Self {
        Self {
            registry,
            event_bus,
            scratch,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember the most recent failure for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::scan_routes())
        .merge(api::upload_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
