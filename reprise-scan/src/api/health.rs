//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status ("ok", "busy" or "degraded")
    pub status: String,
    /// Module name ("reprise-scan")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Scans currently running
    pub running_scans: usize,
    /// Last error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// "degraded" once a scan was rejected for misconfiguration (a missing
/// discovery key stays missing until restart), else "busy" while scanning
pub fn service_status(running_scans: usize, last_error: Option<&str>) -> &'static str {
    match (last_error, running_scans) {
        (Some(_), _) => "degraded",
        (None, 0) => "ok",
        (None, _) => "busy",
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let running_scans = state.registry.running_count().await;
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: service_status(running_scans, last_error.as_deref()).to_string(),
        module: "reprise-scan".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        running_scans,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
