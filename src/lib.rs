#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod backup;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{Extension, Router};
use std::sync::Arc;

use crate::auth::consts as perm;
use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: config::AppConfig) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let services = handlers::AppServices::new(db.clone(), &config, auth.clone());
        Self {
            db,
            config,
            auth,
            services,
        }
    }
}

/// Everything under `/api`, each group gated by the permission it needs.
pub fn api_routes(config: &config::AppConfig) -> Router<AppState> {
    let assets_read = handlers::assets::read_routes().with_permission(perm::ASSETS_READ);
    let assets_write = handlers::assets::write_routes().with_permission(perm::ASSETS_WRITE);

    let employees_read = handlers::employees::read_routes().with_permission(perm::EMPLOYEES_READ);
    let employees_write =
        handlers::employees::write_routes().with_permission(perm::EMPLOYEES_WRITE);

    let lookups_read = handlers::lookups::read_routes().with_permission(perm::LOOKUPS_READ);
    let lookups_write = handlers::lookups::write_routes().with_permission(perm::LOOKUPS_WRITE);

    let sessions_read = handlers::so_sessions::read_routes().with_permission(perm::SESSIONS_READ);
    let sessions_scan = handlers::so_sessions::scan_routes().with_permission(perm::SESSIONS_SCAN);
    let sessions_admin =
        handlers::so_sessions::admin_routes().with_permission(perm::SESSIONS_MANAGE);

    let checkouts_read = handlers::check_outs::read_routes().with_permission(perm::CHECKOUTS_READ);
    let checkouts_write =
        handlers::check_outs::write_routes().with_permission(perm::CHECKOUTS_WRITE);

    let users = handlers::users::user_routes().with_permission(perm::USERS_MANAGE);
    let backup = handlers::backup::backup_routes(config).with_permission(perm::BACKUP_MANAGE);

    Router::new()
        .merge(handlers::auth::auth_routes())
        .merge(assets_read)
        .merge(assets_write)
        .merge(employees_read)
        .merge(employees_write)
        .merge(lookups_read)
        .merge(lookups_write)
        .merge(sessions_read)
        .merge(sessions_scan)
        .merge(sessions_admin)
        .merge(checkouts_read)
        .merge(checkouts_write)
        .merge(users)
        .merge(backup)
}

/// The complete application: `/api`, health checks and Swagger UI, with
/// request ids and HTTP tracing on every request.
pub fn app_router(state: AppState) -> Router {
    let auth = state.auth.clone();
    let db = state.db.clone();

    Router::new()
        .nest("/api", api_routes(&state.config))
        .with_state(state)
        .nest("/health", health::health_routes(db.clone()))
        .merge(openapi::swagger_ui())
        .layer(Extension(auth))
        .layer(Extension(db))
        .layer(tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}
