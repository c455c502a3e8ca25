use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use super::common::success_response;
use crate::{backup::RestoreReport, config::AppConfig, errors::ServiceError, AppState};

/// Multipart field carrying the archive.
const UPLOAD_FIELD: &str = "file";

/// Download a zip of every table
#[utoipa::path(
    get,
    path = "/api/backup/export",
    responses(
        (status = 200, description = "Backup archive", content_type = "application/zip", body = Vec<u8>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "backup"
)]
pub async fn export_backup(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let bytes = state.services.backup.export().await?;
    let filename = format!("backup-{}.zip", Utc::now().format("%Y%m%d-%H%M%S"));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    ))
}

/// Replace all data with the contents of a backup archive.
///
/// Accepts `multipart/form-data` with a `file` field, or the zip as the raw body.
#[utoipa::path(
    post,
    path = "/api/backup/import",
    request_body(content = Vec<u8>, content_type = "application/zip"),
    responses(
        (status = 200, description = "Restore report", body = RestoreReport),
        (status = 400, description = "Not a usable archive", body = crate::errors::ErrorResponse),
        (status = 422, description = "Row data could not be transformed", body = crate::errors::ErrorResponse),
        (status = 502, description = "Every restore engine failed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "backup"
)]
pub async fn import_backup(
    State(state): State<AppState>,
    request: Request,
) -> Result<impl IntoResponse, ServiceError> {
    let bytes = read_upload(request).await?;
    if bytes.is_empty() {
        return Err(ServiceError::InvalidInput("backup archive is empty".into()));
    }
    info!(bytes = bytes.len(), "backup upload received");
    let report = state.services.backup.import(bytes.to_vec()).await?;
    Ok(success_response(report))
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

async fn read_upload(request: Request) -> Result<Bytes, ServiceError> {
    if !is_multipart(&request) {
        return Bytes::from_request(request, &())
            .await
            .map_err(|e| ServiceError::InvalidInput(format!("failed to read body: {}", e)));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidInput(e.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| ServiceError::InvalidInput(e.to_string()));
        }
    }
    Err(ServiceError::InvalidInput(format!(
        "multipart body has no '{}' field",
        UPLOAD_FIELD
    )))
}

/// Export and import, with the upload size and time budget from config.
pub fn backup_routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .route("/backup/export", get(export_backup))
        .route("/backup/import", post(import_backup))
        .layer(DefaultBodyLimit::max(config.backup_max_upload_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backup_max_duration_secs,
        )))
}
