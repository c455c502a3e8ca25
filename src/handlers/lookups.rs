//! Sites, categories and departments share one set of handlers; the router
//! for each table carries its [`LookupKind`] as a request extension.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    errors::ServiceError,
    services::lookups::{
        CreateLookupInput, LookupItem, LookupKind, ReorderInput, UpdateLookupInput,
    },
    AppState,
};

/// Collection segment of each lookup table.
pub const LOOKUP_PATHS: [(LookupKind, &str); 3] = [
    (LookupKind::Site, "sites"),
    (LookupKind::Category, "categories"),
    (LookupKind::Department, "departments"),
];

#[utoipa::path(
    get,
    path = "/api/{kind}",
    params(("kind" = String, Path, description = "sites, categories or departments")),
    responses((status = 200, description = "Items in display order", body = [LookupItem])),
    security(("Bearer" = [])),
    tag = "lookups"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Extension(kind): Extension<LookupKind>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.lookups.list(kind).await?))
}

#[utoipa::path(
    get,
    path = "/api/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "sites, categories or departments"),
        ("id" = Uuid, Path, description = "Item id")
    ),
    responses(
        (status = 200, description = "Item", body = LookupItem),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "lookups"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Extension(kind): Extension<LookupKind>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.lookups.get(kind, id).await?))
}

/// Appends a new item at the end of the display order
#[utoipa::path(
    post,
    path = "/api/{kind}",
    params(("kind" = String, Path, description = "sites, categories or departments")),
    request_body = CreateLookupInput,
    responses(
        (status = 201, description = "Created", body = LookupItem),
        (status = 409, description = "Name taken", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "lookups"
)]
pub async fn create_item(
    State(state): State<AppState>,
    Extension(kind): Extension<LookupKind>,
    Json(payload): Json<CreateLookupInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    Ok(created_response(
        state.services.lookups.create(kind, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "sites, categories or departments"),
        ("id" = Uuid, Path, description = "Item id")
    ),
    request_body = UpdateLookupInput,
    responses(
        (status = 200, description = "Updated", body = LookupItem),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name taken", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "lookups"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Extension(kind): Extension<LookupKind>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLookupInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    Ok(success_response(
        state.services.lookups.update(kind, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "sites, categories or departments"),
        ("id" = Uuid, Path, description = "Item id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Still referenced by assets", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "lookups"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Extension(kind): Extension<LookupKind>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.lookups.delete(kind, id).await?;
    Ok(no_content_response())
}

/// Rewrites the display order from the given id sequence
#[utoipa::path(
    put,
    path = "/api/{kind}/reorder",
    params(("kind" = String, Path, description = "sites, categories or departments")),
    request_body = ReorderInput,
    responses(
        (status = 200, description = "Items in their new order", body = [LookupItem]),
        (status = 404, description = "Unknown id", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "lookups"
)]
pub async fn reorder_items(
    State(state): State<AppState>,
    Extension(kind): Extension<LookupKind>,
    Json(payload): Json<ReorderInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    Ok(success_response(
        state.services.lookups.reorder(kind, payload).await?,
    ))
}

pub fn read_routes() -> Router<AppState> {
    LOOKUP_PATHS
        .into_iter()
        .fold(Router::new(), |router, (kind, segment)| {
            router.merge(
                Router::new()
                    .route(&format!("/{}", segment), get(list_items))
                    .route(&format!("/{}/:id", segment), get(get_item))
                    .layer(Extension(kind)),
            )
        })
}

pub fn write_routes() -> Router<AppState> {
    LOOKUP_PATHS
        .into_iter()
        .fold(Router::new(), |router, (kind, segment)| {
            router.merge(
                Router::new()
                    .route(&format!("/{}", segment), post(create_item))
                    .route(&format!("/{}/reorder", segment), put(reorder_items))
                    .route(
                        &format!("/{}/:id", segment),
                        put(update_item).delete(delete_item),
                    )
                    .layer(Extension(kind)),
            )
        })
}
