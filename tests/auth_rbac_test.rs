//! Login, bearer-token checks and role gating over the HTTP surface.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, TestApp, TEST_PASSWORD};
use opname_api::{
    entities::UserRole,
    services::users::{CreateUserInput, UpdateUserInput},
};
use serde_json::json;

#[tokio::test]
async fn login_issues_a_token_that_opens_me() {
    let app = TestApp::new().await;
    app.state
        .services
        .users
        .create(CreateUserInput {
            email: "Auditor@Example.com".into(),
            name: "Auditor".into(),
            password: TEST_PASSWORD.into(),
            role: UserRole::SoAssetUser,
            is_active: Some(true),
        })
        .await
        .unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "auditor@example.com", "password": TEST_PASSWORD})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    let token = body["access_token"].as_str().unwrap().to_string();

    let me = app.request(Method::GET, "/api/auth/me", None, Some(&token)).await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = body_json(me).await;
    assert_eq!(me["email"], "auditor@example.com");
    assert_eq!(me["role"], "SO_ASSET_USER");
    assert_eq!(me["capabilities"]["can_scan"], true);
    assert_eq!(me["capabilities"]["can_edit"], false);
    assert_eq!(me["capabilities"]["can_admin"], false);
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = TestApp::new().await;
    app.admin_token().await;

    let unknown = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "nobody@example.com", "password": "whatever-123"})),
            None,
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown = body_json(unknown).await;

    let admin = app.state.services.users.list().await.unwrap().remove(0);
    let wrong = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": admin.email, "password": "not-the-password"})),
            None,
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong = body_json(wrong).await;
    assert_eq!(unknown["message"], wrong["message"]);
}

#[tokio::test]
async fn deactivated_accounts_cannot_log_in() {
    let app = TestApp::new().await;
    app.state
        .services
        .users
        .create(CreateUserInput {
            email: "former@example.com".into(),
            name: "Former".into(),
            password: TEST_PASSWORD.into(),
            role: UserRole::Viewer,
            is_active: Some(false),
        })
        .await
        .unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "former@example.com", "password": TEST_PASSWORD})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new().await;

    let missing = app.request(Method::GET, "/api/assets", None, None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .request(Method::GET, "/api/assets", None, Some("not-a-jwt"))
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn viewer_reads_but_cannot_write() {
    let app = TestApp::new().await;
    let token = app.token_for(UserRole::Viewer).await;

    let list = app.request(Method::GET, "/api/assets", None, Some(&token)).await;
    assert_eq!(list.status(), StatusCode::OK);

    let create = app
        .request(
            Method::POST,
            "/api/assets",
            Some(json!({"no_asset": "A-1", "name": "Desk"})),
            Some(&token),
        )
        .await;
    assert_eq!(create.status(), StatusCode::FORBIDDEN);

    let sites = app
        .request(Method::POST, "/api/sites", Some(json!({"name": "HQ"})), Some(&token))
        .await;
    assert_eq!(sites.status(), StatusCode::FORBIDDEN);

    let users = app.request(Method::GET, "/api/admin/users", None, Some(&token)).await;
    assert_eq!(users.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn auditor_scans_but_cannot_manage_sessions() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let auditor = app.token_for(UserRole::SoAssetUser).await;
    app.seed_asset("A-1", "Desk").await;

    let denied = app
        .request(
            Method::POST,
            "/api/admin/sessions",
            Some(json!({"name": "Audit", "year": 2024})),
            Some(&auditor),
        )
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let session = body_json(
        app.request(
            Method::POST,
            "/api/admin/sessions",
            Some(json!({"name": "Audit", "year": 2024})),
            Some(&admin),
        )
        .await,
    )
    .await;
    let id = session["id"].as_str().unwrap();

    let scan = app
        .request(
            Method::POST,
            &format!("/api/so-sessions/{}/scan", id),
            Some(json!({"no_asset": "A-1"})),
            Some(&auditor),
        )
        .await;
    assert_eq!(scan.status(), StatusCode::CREATED);

    let complete = app
        .request(
            Method::POST,
            &format!("/api/admin/sessions/{}/complete", id),
            None,
            Some(&auditor),
        )
        .await;
    assert_eq!(complete.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_changes_apply_to_tokens_already_issued() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let me = body_json(app.request(Method::GET, "/api/auth/me", None, Some(&token)).await).await;
    let id = me["id"].as_str().unwrap().parse().unwrap();
    let users = &app.state.services.users;

    users
        .update(
            id,
            UpdateUserInput {
                role: Some(UserRole::Viewer),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let demoted = app
        .request(
            Method::POST,
            "/api/assets",
            Some(json!({"no_asset": "A-1", "name": "Desk"})),
            Some(&token),
        )
        .await;
    assert_eq!(demoted.status(), StatusCode::FORBIDDEN);
    let reads = app.request(Method::GET, "/api/assets", None, Some(&token)).await;
    assert_eq!(reads.status(), StatusCode::OK);

    users
        .update(
            id,
            UpdateUserInput {
                role: Some(UserRole::Admin),
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let deactivated = app
        .request(
            Method::POST,
            "/api/assets",
            Some(json!({"no_asset": "A-1", "name": "Desk"})),
            Some(&token),
        )
        .await;
    assert_eq!(deactivated.status(), StatusCode::UNAUTHORIZED);
    let me = app.request(Method::GET, "/api/auth/me", None, Some(&token)).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_cannot_delete_own_account() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let me = body_json(app.request(Method::GET, "/api/auth/me", None, Some(&token)).await).await;
    let id = me["id"].as_str().unwrap();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/admin/users/{}", id),
            None,
            Some(&token),
        )
        .await;
    assert!(response.status().is_client_error());
    assert_ne!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_paths_are_not_found_without_credentials() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/nope", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_docs_are_public() {
    let app = TestApp::new().await;
    let health = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(health.status(), StatusCode::OK);

    let docs = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(docs.status(), StatusCode::OK);
}
