use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::users::{CreateUserInput, UpdateUserInput, UserResponse},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.users.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.users.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserInput,
    responses(
        (status = 201, description = "Created", body = UserResponse),
        (status = 409, description = "Email taken", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    Ok(created_response(state.services.users.create(payload).await?))
}

/// Update name, role, active flag or reset the password
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "Updated", body = UserResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    Ok(success_response(state.services.users.update(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Cannot delete yourself", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.users.delete(&actor, id).await?;
    Ok(no_content_response())
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route(
            "/admin/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}
