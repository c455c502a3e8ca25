use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Opname API",
        description = r#"
# Asset Inventory & Stock Opname API

Asset register, employees, sites/categories/departments, stock opname
(physical audit) sessions, asset check-outs, CSV import/export and full
backup export/restore.

## Authentication

Every endpoint except `/api/auth/login` and `/health*` needs a bearer token:

```
Authorization: Bearer <jwt>
```

Roles: `ADMIN` (everything), `SO_ASSET_USER` (read and scan), `VIEWER` (read only).

## Errors

```json
{
  "error": "Not Found",
  "message": "Not found: Asset 550e8400-e29b-41d4-a716-446655440000",
  "request_id": "…",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "auth", description = "Login and current user"),
        (name = "assets", description = "Asset register and asset CSV"),
        (name = "employees", description = "Employees and employee CSV"),
        (name = "lookups", description = "Sites, categories and departments"),
        (name = "users", description = "User administration"),
        (name = "sessions", description = "Stock opname session lifecycle"),
        (name = "scanning", description = "Scanning and staging entries"),
        (name = "check-outs", description = "Asset lending"),
        (name = "backup", description = "Backup export and restore")
    ),
    paths(
        handlers::auth::login,
        handlers::auth::me,
        handlers::assets::list_assets,
        handlers::assets::get_asset,
        handlers::assets::create_asset,
        handlers::assets::update_asset,
        handlers::assets::delete_asset,
        handlers::assets::generate_number,
        handlers::assets::export_assets,
        handlers::assets::import_assets,
        handlers::employees::list_employees,
        handlers::employees::get_employee,
        handlers::employees::create_employee,
        handlers::employees::update_employee,
        handlers::employees::delete_employee,
        handlers::employees::export_employees,
        handlers::employees::import_employees,
        handlers::lookups::list_items,
        handlers::lookups::get_item,
        handlers::lookups::create_item,
        handlers::lookups::update_item,
        handlers::lookups::delete_item,
        handlers::lookups::reorder_items,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::so_sessions::list_sessions,
        handlers::so_sessions::get_session,
        handlers::so_sessions::create_session,
        handlers::so_sessions::delete_session,
        handlers::so_sessions::complete_session,
        handlers::so_sessions::cancel_session,
        handlers::so_sessions::list_entries,
        handlers::so_sessions::scan_asset,
        handlers::so_sessions::update_entry,
        handlers::so_sessions::remove_entry,
        handlers::check_outs::list_checkouts,
        handlers::check_outs::get_checkout,
        handlers::check_outs::create_checkout,
        handlers::check_outs::check_in,
        handlers::check_outs::delete_checkout,
        handlers::backup::export_backup,
        handlers::backup::import_backup,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::AssetStatus,
        crate::entities::CheckoutStatus,
        crate::entities::SessionStatus,
        crate::entities::UserRole,
        crate::auth::Capabilities,
        crate::backup::TableReport,
        crate::backup::EngineKind,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the `Bearer` scheme the paths refer to.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
