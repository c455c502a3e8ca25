use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    entities::asset_checkout,
    errors::ServiceError,
    services::check_outs::{CheckInInput, CheckoutFilter, CreateCheckoutInput},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/check-outs",
    params(CheckoutFilter),
    responses((status = 200, description = "Check-outs, newest first", body = [asset_checkout::Model])),
    security(("Bearer" = [])),
    tag = "check-outs"
)]
pub async fn list_checkouts(
    State(state): State<AppState>,
    Query(filter): Query<CheckoutFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.checkouts.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/check-outs/{id}",
    params(("id" = Uuid, Path, description = "Check-out id")),
    responses(
        (status = 200, description = "Check-out", body = asset_checkout::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "check-outs"
)]
pub async fn get_checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.checkouts.get(id).await?))
}

/// Lend an asset out
#[utoipa::path(
    post,
    path = "/api/check-outs",
    request_body = CreateCheckoutInput,
    responses(
        (status = 201, description = "Checked out", body = asset_checkout::Model),
        (status = 404, description = "Unknown asset or employee", body = crate::errors::ErrorResponse),
        (status = 409, description = "Asset is already out", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "check-outs"
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CreateCheckoutInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    Ok(created_response(state.services.checkouts.create(payload).await?))
}

/// Mark a check-out as returned
#[utoipa::path(
    post,
    path = "/api/check-outs/{id}/check-in",
    params(("id" = Uuid, Path, description = "Check-out id")),
    request_body = CheckInInput,
    responses(
        (status = 200, description = "Returned", body = asset_checkout::Model),
        (status = 400, description = "Already returned", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "check-outs"
)]
pub async fn check_in(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<CheckInInput>>,
) -> Result<impl IntoResponse, ServiceError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    validate_input(&payload)?;
    Ok(success_response(
        state.services.checkouts.check_in(id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/check-outs/{id}",
    params(("id" = Uuid, Path, description = "Check-out id")),
    responses((status = 204, description = "Deleted")),
    security(("Bearer" = [])),
    tag = "check-outs"
)]
pub async fn delete_checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.checkouts.delete(id).await?;
    Ok(no_content_response())
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/check-outs", get(list_checkouts))
        .route("/check-outs/:id", get(get_checkout))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/check-outs", post(create_checkout))
        .route("/check-outs/:id", axum::routing::delete(delete_checkout))
        .route("/check-outs/:id/check-in", post(check_in))
}
