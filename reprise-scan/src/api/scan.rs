//! Scan job API handlers
//!
//! POST /scan, GET /status, GET /scans, GET /scans/:id, POST /scans/:id/cancel

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::scan::{ScanError, ScanRequest, ScanResult, ScanSnapshot, ScanState, ScanSummary};
use crate::AppState;

/// POST /scan request
#[derive(Debug, Deserialize)]
pub struct StartScanRequest {
    pub query: String,
    pub result_cap: usize,
    pub reference_locator: String,
}

/// POST /scan response
#[derive(Debug, Serialize, Deserialize)]
pub struct StartScanResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// GET /status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub is_running: bool,
    pub matched: Vec<ScanResult>,
    pub non_matched: Vec<ScanResult>,
}

impl From<Option<ScanSnapshot>> for StatusResponse {
    fn from(snapshot: Option<ScanSnapshot>) -> Self {
        match snapshot {
            Some(s) => Self {
                job_id: Some(s.job_id),
                is_running: s.is_running(),
                matched: s.matched,
                non_matched: s.non_matched,
            },
            None => Self {
                job_id: None,
                is_running: false,
                matched: Vec::new(),
                non_matched: Vec::new(),
            },
        }
    }
}

/// POST /scans/:id/cancel response
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelScanResponse {
    pub job_id: Uuid,
    pub state: ScanState,
    /// False when the job had already finished
    pub cancellation_requested: bool,
    pub candidates_processed: usize,
}

/// POST /scan
///
/// Registers a scan and returns 202 Accepted with its job id. The episode
/// runs in the background.
pub async fn start_scan(
    State(state): State<AppState>,
    body: Result<Json<StartScanRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StartScanResponse>)> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let request = ScanRequest {
        query: body.query,
        result_cap: body.result_cap,
        reference_locator: body.reference_locator,
    };

    let job_id = match state.registry.submit(request).await {
        Ok(job_id) => job_id,
        Err(e) => {
            if let ScanError::Configuration(ref config_error) = e {
                warn!(error = %config_error, "Scan rejected: service misconfigured");
                state.record_error(config_error.to_string()).await;
            }
            return Err(e.into());
        }
    };

    info!(job_id = %job_id, "Scan scheduled");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartScanResponse {
            job_id,
            status: "scheduled".to_string(),
        }),
    ))
}

/// GET /status
///
/// Progress of the most recently submitted scan.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.registry.latest().await.into())
}

/// GET /scans
pub async fn list_scans(State(state): State<AppState>) -> Json<Vec<ScanSummary>> {
    Json(state.registry.list().await)
}

/// GET /scans/:id
pub async fn get_scan(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ScanSnapshot>> {
    state
        .registry
        .get(job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Scan job not found: {}", job_id)))
}

/// POST /scans/:id/cancel
pub async fn cancel_scan(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<CancelScanResponse>> {
    let snapshot = state.registry.cancel(job_id).await?;

    Ok(Json(CancelScanResponse {
        job_id,
        state: snapshot.state,
        cancellation_requested: snapshot.is_running(),
        candidates_processed: snapshot.candidates_processed,
    }))
}

/// Build scan routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan", post(start_scan))
        .route("/status", get(get_status))
        .route("/scans", get(list_scans))
        .route("/scans/:id", get(get_scan))
        .route("/scans/:id/cancel", post(cancel_scan))
}
