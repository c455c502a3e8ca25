use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::common::{success_response, validate_input};
use crate::{
    auth::{AuthRouterExt, AuthUser, TokenResponse},
    errors::ServiceError,
    services::users::{LoginRequest, MeResponse},
    AppState,
};

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let token = state.services.users.login(payload).await?;
    Ok(success_response(token))
}

/// Current user with UI capability flags
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.users.me(&user).await?))
}

pub fn auth_routes() -> Router<AppState> {
    let protected = Router::new().route("/auth/me", get(me)).with_auth();
    Router::new()
        .route("/auth/login", post(login))
        .merge(protected)
}
