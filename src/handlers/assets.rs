use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::{
    created_response, csv_response, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    errors::ServiceError,
    services::assets::{AssetDetail, AssetFilter, CreateAssetInput, UpdateAssetInput},
    services::csv::ImportReport,
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GenerateNumberQuery {
    pub category_id: Uuid,
    pub site_id: Uuid,
    /// Running number is used when blank
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedNumber {
    pub no_asset: String,
}

/// List assets
#[utoipa::path(
    get,
    path = "/api/assets",
    params(AssetFilter, PaginationParams),
    responses(
        (status = 200, description = "Page of assets", body = PaginatedResponse<crate::entities::asset::Model>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "assets"
)]
pub async fn list_assets(
    State(state): State<AppState>,
    Query(filter): Query<AssetFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let p = pagination.normalized();
    let (items, total) = state
        .services
        .assets
        .list(&filter, p.page, p.per_page)
        .await?;
    Ok(success_response(PaginatedResponse::new(
        items, p.page, p.per_page, total,
    )))
}

/// Get an asset with its additional fields
#[utoipa::path(
    get,
    path = "/api/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset", body = AssetDetail),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "assets"
)]
pub async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let asset = state.services.assets.get(id).await?;
    Ok(success_response(AssetDetail::from(asset)))
}

/// Create an asset
#[utoipa::path(
    post,
    path = "/api/assets",
    request_body = CreateAssetInput,
    responses(
        (status = 201, description = "Created", body = AssetDetail),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Asset number taken", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "assets"
)]
pub async fn create_asset(
    State(state): State<AppState>,
    Json(payload): Json<CreateAssetInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let asset = state.services.assets.create(payload).await?;
    Ok(created_response(AssetDetail::from(asset)))
}

/// Update an asset
#[utoipa::path(
    put,
    path = "/api/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset id")),
    request_body = UpdateAssetInput,
    responses(
        (status = 200, description = "Updated", body = AssetDetail),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Asset number taken", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "assets"
)]
pub async fn update_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAssetInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let asset = state.services.assets.update(id, payload).await?;
    Ok(success_response(AssetDetail::from(asset)))
}

/// Delete an asset
#[utoipa::path(
    delete,
    path = "/api/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Asset is checked out", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "assets"
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.assets.delete(id).await?;
    Ok(no_content_response())
}

/// Preview the number a new asset would get
#[utoipa::path(
    get,
    path = "/api/assets/generate-number",
    params(GenerateNumberQuery),
    responses(
        (status = 200, description = "Generated number", body = GeneratedNumber),
        (status = 400, description = "Sort order out of range", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown category or site", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "assets"
)]
pub async fn generate_number(
    State(state): State<AppState>,
    Query(query): Query<GenerateNumberQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let no_asset = state
        .services
        .assets
        .generate_number(query.category_id, query.site_id, query.prefix)
        .await?;
    Ok(success_response(GeneratedNumber { no_asset }))
}

/// Export every asset as CSV
#[utoipa::path(
    get,
    path = "/api/assets/export",
    responses((status = 200, description = "CSV file", content_type = "text/csv", body = String)),
    security(("Bearer" = [])),
    tag = "assets"
)]
pub async fn export_assets(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let body = state.services.csv.export_assets().await?;
    Ok(csv_response("assets.csv", body))
}

/// Import assets from CSV, upserting on the asset number
#[utoipa::path(
    post,
    path = "/api/assets/import",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 200, description = "Import summary with per-line errors", body = ImportReport),
        (status = 400, description = "Malformed CSV", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "assets"
)]
pub async fn import_assets(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.csv.import_assets(&body).await?;
    info!(
        created = report.created,
        updated = report.updated,
        errors = report.errors.len(),
        "asset CSV imported"
    );
    Ok(success_response(report))
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/assets", get(list_assets))
        .route("/assets/generate-number", get(generate_number))
        .route("/assets/export", get(export_assets))
        .route("/assets/:id", get(get_asset))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/assets", post(create_asset))
        .route("/assets/import", post(import_assets))
        .route("/assets/:id", axum::routing::put(update_asset).delete(delete_asset))
}
