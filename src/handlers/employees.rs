use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::common::{
    created_response, csv_response, no_content_response, success_response, validate_input,
};
use crate::{
    errors::ServiceError,
    services::csv::ImportReport,
    services::employees::{
        CreateEmployeeInput, EmployeeDetail, EmployeeFilter, UpdateEmployeeInput,
    },
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeFilter),
    responses((status = 200, description = "Employees ordered by name", body = [crate::entities::employee::Model])),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn list_employees(
    State(state): State<AppState>,
    Query(filter): Query<EmployeeFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.employees.list(&filter).await?))
}

/// Employee with the assets they are PIC of
#[utoipa::path(
    get,
    path = "/api/employees/{id}",
    params(("id" = Uuid, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee", body = EmployeeDetail),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.employees.get_detail(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployeeInput,
    responses(
        (status = 201, description = "Created", body = crate::entities::employee::Model),
        (status = 409, description = "Employee code taken", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn create_employee(
    State(state): State<AppState>,
    Json(payload): Json<CreateEmployeeInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    Ok(created_response(state.services.employees.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/employees/{id}",
    params(("id" = Uuid, Path, description = "Employee id")),
    request_body = UpdateEmployeeInput,
    responses(
        (status = 200, description = "Updated", body = crate::entities::employee::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmployeeInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    Ok(success_response(
        state.services.employees.update(id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/employees/{id}",
    params(("id" = Uuid, Path, description = "Employee id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Employee is PIC of assets", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.employees.delete(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/employees/export",
    responses((status = 200, description = "CSV file", content_type = "text/csv", body = String)),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn export_employees(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let body = state.services.csv.export_employees().await?;
    Ok(csv_response("employees.csv", body))
}

/// Upserts employees on their code
#[utoipa::path(
    post,
    path = "/api/employees/import",
    request_body(content = String, content_type = "text/csv"),
    responses((status = 200, description = "Import summary", body = ImportReport)),
    security(("Bearer" = [])),
    tag = "employees"
)]
pub async fn import_employees(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.csv.import_employees(&body).await?,
    ))
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/employees", get(list_employees))
        .route("/employees/export", get(export_employees))
        .route("/employees/:id", get(get_employee))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/employees", post(create_employee))
        .route("/employees/import", post(import_employees))
        .route(
            "/employees/:id",
            axum::routing::put(update_employee).delete(delete_employee),
        )
}
