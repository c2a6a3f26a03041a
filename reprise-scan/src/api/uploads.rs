//! Reference clip uploads
//!
//! POST /uploads stages a clip in the uploads directory so a scan can use it
//! as its reference via an `upload:<name>` locator.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::sources::fetch::{is_safe_file_name, UPLOAD_PREFIX};
use crate::AppState;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// POST /uploads response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Locator to pass as `reference_locator`
    pub locator: String,
    pub bytes: usize,
}

/// Staged file name: unique prefix plus the sanitized client name
pub fn staged_file_name(client_name: Option<&str>) -> String {
    let sanitized: String = client_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let sanitized = sanitized.trim_start_matches('.');

    let prefix = Uuid::new_v4().simple().to_string();
    if sanitized.is_empty() {
        format!("{}.audio", prefix)
    } else {
        format!("{}-{}", prefix, sanitized)
    }
}

/// POST /uploads (multipart field `file`)
pub async fn upload_reference(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = staged_file_name(field.file_name());
        if !is_safe_file_name(&name) {
            return Err(ApiError::BadRequest(format!("Unusable file name: {}", name)));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        if data.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
        }

        tokio::fs::create_dir_all(&state.scratch.uploads).await?;
        let path = state.scratch.uploads.join(&name);
        tokio::fs::write(&path, &data).await?;

        info!(path = %path.display(), bytes = data.len(), "Reference clip staged");

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                locator: format!("{}{}", UPLOAD_PREFIX, name),
                bytes: data.len(),
            }),
        ));
    }

    Err(ApiError::BadRequest("Missing multipart field 'file'".to_string()))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads", post(upload_reference))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
