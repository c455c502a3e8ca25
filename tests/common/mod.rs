#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use opname_api::{
    config::AppConfig,
    db,
    entities::UserRole,
    services::{
        assets::CreateAssetInput,
        lookups::{CreateLookupInput, LookupKind},
        users::{CreateUserInput, LoginRequest},
    },
    AppState,
};

pub const TEST_SECRET: &str = "test_secret_key_for_integration_runs_0123456789abcdef";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> AppConfig {
    AppConfig::new(
        "sqlite::memory:".to_string(),
        TEST_SECRET.to_string(),
        3600,
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    )
}

/// Application over a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::establish_connection(&cfg.database_url)
            .await
            .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = opname_api::app_router(state.clone());
        Self { router, state }
    }

    /// Creates an account with `role` and logs it in.
    pub async fn token_for(&self, role: UserRole) -> String {
        let email = format!("{}-{}@example.com", role.to_string().to_lowercase(), Uuid::new_v4());
        self.state
            .services
            .users
            .create(CreateUserInput {
                email: email.clone(),
                name: format!("{} user", role),
                password: TEST_PASSWORD.to_string(),
                role,
                is_active: Some(true),
            })
            .await
            .expect("seed user");

        self.state
            .services
            .users
            .login(LoginRequest {
                email,
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .expect("login seeded user")
            .access_token
    }

    pub async fn admin_token(&self) -> String {
        self.token_for(UserRole::Admin).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// JSON request with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("build request")).await
    }

    /// Raw body with an explicit content type.
    pub async fn request_bytes(
        &self,
        method: Method,
        uri: &str,
        content_type: &str,
        body: Vec<u8>,
        token: &str,
    ) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .expect("build request");
        self.send(request).await
    }

    pub async fn seed_lookup(&self, kind: LookupKind, name: &str) -> Uuid {
        self.state
            .services
            .lookups
            .create(
                kind,
                CreateLookupInput {
                    name: name.to_string(),
                },
            )
            .await
            .expect("seed lookup")
            .id
    }

    pub async fn seed_asset(&self, no_asset: &str, name: &str) -> opname_api::entities::asset::Model {
        self.state
            .services
            .assets
            .create(CreateAssetInput {
                no_asset: Some(no_asset.to_string()),
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .expect("seed asset")
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes")
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json response")
}
