//! Stock opname sessions: admin lifecycle under `/admin/sessions`, scanning
//! and staging under `/so-sessions`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    auth::AuthUser,
    entities::so_session,
    errors::ServiceError,
    services::so_sessions::{
        CreateSessionInput, EntryWithAsset, ScanRequest, SessionFilter, UpdateEntryInput,
    },
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/admin/sessions",
    params(SessionFilter),
    responses((status = 200, description = "Sessions, newest first", body = [so_session::Model])),
    security(("Bearer" = [])),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.sessions.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session", body = so_session::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.sessions.get(id).await?))
}

/// Open a session; the expected total counts every asset not disposed or sold
#[utoipa::path(
    post,
    path = "/api/admin/sessions",
    request_body = CreateSessionInput,
    responses(
        (status = 201, description = "Created", body = so_session::Model),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "sessions"
)]
pub async fn create_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateSessionInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let session = state
        .services
        .sessions
        .create(payload, Some(user.user_id))
        .await?;
    Ok(created_response(session))
}

#[utoipa::path(
    delete,
    path = "/api/admin/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Deleted with its entries"),
        (status = 400, description = "Session is completed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.sessions.delete(id).await?;
    Ok(no_content_response())
}

/// Apply identified entries to their assets and close the session
#[utoipa::path(
    post,
    path = "/api/admin/sessions/{id}/complete",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Completed", body = so_session::Model),
        (status = 400, description = "Session is not active", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "sessions"
)]
pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.sessions.complete(id).await?))
}

/// Discard every entry and close the session without touching assets
#[utoipa::path(
    post,
    path = "/api/admin/sessions/{id}/cancel",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Cancelled", body = so_session::Model),
        (status = 400, description = "Session is not active", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "sessions"
)]
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.sessions.cancel(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/so-sessions/{id}/entries",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Entries with their assets", body = [EntryWithAsset]),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "scanning"
)]
pub async fn list_entries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.sessions.entries(id).await?))
}

/// Record a scanned asset. Scanning the same asset twice returns the
/// existing entry with 200 instead of 201.
#[utoipa::path(
    post,
    path = "/api/so-sessions/{id}/scan",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = ScanRequest,
    responses(
        (status = 201, description = "New entry", body = crate::entities::so_asset_entry::Model),
        (status = 200, description = "Asset was already scanned", body = crate::entities::so_asset_entry::Model),
        (status = 400, description = "Session is not active", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown asset", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "scanning"
)]
pub async fn scan_asset(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScanRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .sessions
        .scan(id, payload, Some(user.user_id))
        .await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.entry)))
}

/// Stage edits on an entry; nothing reaches the asset before completion
#[utoipa::path(
    put,
    path = "/api/so-sessions/{id}/entries/{entry_id}",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("entry_id" = Uuid, Path, description = "Entry id")
    ),
    request_body = UpdateEntryInput,
    responses(
        (status = 200, description = "Updated entry", body = crate::entities::so_asset_entry::Model),
        (status = 400, description = "Session is not active", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "scanning"
)]
pub async fn update_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateEntryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    Ok(success_response(
        state
            .services
            .sessions
            .update_entry(id, entry_id, payload)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/so-sessions/{id}/entries/{entry_id}",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("entry_id" = Uuid, Path, description = "Entry id")
    ),
    responses(
        (status = 204, description = "Removed"),
        (status = 400, description = "Session is not active", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "scanning"
)]
pub async fn remove_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.sessions.remove_entry(id, entry_id).await?;
    Ok(no_content_response())
}

/// Session lookups for every signed-in role.
pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/so-sessions", get(list_sessions))
        .route("/so-sessions/:id", get(get_session))
        .route("/so-sessions/:id/entries", get(list_entries))
}

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/so-sessions/:id/scan", post(scan_asset))
        .route(
            "/so-sessions/:id/entries/:entry_id",
            put(update_entry).delete(remove_entry),
        )
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/sessions", get(list_sessions).post(create_session))
        .route(
            "/admin/sessions/:id",
            get(get_session).delete(delete_session),
        )
        .route("/admin/sessions/:id/complete", post(complete_session))
        .route("/admin/sessions/:id/cancel", post(cancel_session))
}
