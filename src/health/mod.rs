/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`): process is up
 * - Readiness check (`/health/ready`): database answers a ping
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthDetail {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub latency_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub details: BTreeMap<String, HealthDetail>,
}

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: Arc<DatabaseConnection>,
    pub start_time: Instant,
}

impl HealthState {
    pub fn new(db_pool: Arc<DatabaseConnection>) -> Self {
        Self {
            db_pool,
            start_time: Instant::now(),
        }
    }

    fn info(&self, status: HealthStatus) -> HealthInfo {
        HealthInfo {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            details: BTreeMap::new(),
        }
    }
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is running", body = HealthInfo))
)]
pub async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    Json(state.info(HealthStatus::Up))
}

/// Readiness check: 503 while the database is unreachable.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to serve traffic", body = HealthInfo),
        (status = 503, description = "Database unavailable", body = HealthInfo)
    )
)]
pub async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    let started = Instant::now();
    let db = match state.db_pool.ping().await {
        Ok(()) => HealthDetail {
            status: HealthStatus::Up,
            message: None,
            latency_ms: started.elapsed().as_millis() as u64,
        },
        Err(e) => {
            error!("Database health check failed: {}", e);
            HealthDetail {
                status: HealthStatus::Down,
                message: Some("database unreachable".to_string()),
                latency_ms: started.elapsed().as_millis() as u64,
            }
        }
    };

    let overall = db.status;
    let mut info = state.info(overall);
    info.details.insert("database".to_string(), db);

    let code = match overall {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(info))
}

/// Health routes, mounted at `/health`.
pub fn health_routes(db_pool: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(HealthState::new(db_pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn ready_reports_database_up() {
        let db = crate::db::establish_connection("sqlite::memory:")
            .await
            .unwrap();
        let app = Router::new().nest("/health", health_routes(Arc::new(db)));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let info: HealthInfo = serde_json::from_slice(&body).unwrap();
        assert_eq!(info.details["database"].status, HealthStatus::Up);
    }
}
