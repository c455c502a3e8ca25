//! Backup export and full-replacement restore through both engines.

mod common;

use std::time::Duration;

use axum::http::{header, Method, StatusCode};
use common::{body_bytes, body_json, TestApp};
use opname_api::{
    backup::{
        self, transform::mapped_id, BackupArchive, BackupMetadata, BackupService, BackupSettings,
        EngineKind,
    },
    config::BackupPreference,
    services::lookups::LookupKind,
};
use serde_json::{json, Map, Value};
use wiremock::{
    matchers::{header as header_is, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn archive_of(tables: Value) -> BackupArchive {
    let Value::Object(database) = tables else {
        panic!("tables must be an object");
    };
    BackupArchive {
        database,
        metadata: BackupMetadata::default(),
    }
}

fn multipart(bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "opname-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"backup.zip\"\r\nContent-Type: application/zip\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}

fn remote_service(app: &TestApp, server: &MockServer, prefer: BackupPreference) -> BackupService {
    BackupService::new(
        app.state.db.clone(),
        BackupSettings {
            database_url: app.state.config.database_url.clone(),
            prefer,
            remote_url: Some(server.uri()),
            remote_key: Some("service-key".into()),
            batch_size: 2,
            remote_timeout: Duration::from_secs(5),
            max_entry_bytes: 64 * 1024 * 1024,
        },
    )
}

#[tokio::test]
async fn export_then_import_restores_the_snapshot() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let site = app.seed_lookup(LookupKind::Site, "HQ").await;
    let desk = app.seed_asset("A-1", "Desk").await;

    let export = app.request(Method::GET, "/api/backup/export", None, Some(&token)).await;
    assert_eq!(export.status(), StatusCode::OK);
    assert_eq!(export.headers()[header::CONTENT_TYPE], "application/zip");
    assert!(export.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("backup-"));
    let zip = body_bytes(export).await;

    app.state.services.assets.delete(desk.id).await.unwrap();
    app.seed_asset("B-1", "Added after export").await;

    let (content_type, body) = multipart(&zip);
    let import = app
        .request_bytes(Method::POST, "/api/backup/import", &content_type, body, &token)
        .await;
    assert_eq!(import.status(), StatusCode::OK);
    let report = body_json(import).await;
    assert_eq!(report["engine"], "sql");
    let assets_row = report["tables"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["table"] == "assets")
        .unwrap();
    assert_eq!(assets_row["inserted"], 1);

    let assets = &app.state.services.assets;
    assert_eq!(assets.get(desk.id).await.unwrap().name, "Desk");
    assert!(assets.find_by_number("B-1").await.unwrap().is_none());
    assert_eq!(
        app.state.services.lookups.get(LookupKind::Site, site).await.unwrap().name,
        "HQ"
    );
}

#[tokio::test]
async fn raw_zip_bodies_are_accepted_too() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let archive = archive_of(json!({"sites": [{"id": 1, "name": "HQ"}]}));
    let zip = backup::archive::write_archive(&archive).unwrap();

    let response = app
        .request_bytes(Method::POST, "/api/backup/import", "application/zip", zip, &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 1);
}

#[tokio::test]
async fn legacy_dumps_with_camel_case_and_integer_ids_restore() {
    let app = TestApp::new().await;
    let archive = archive_of(json!({
        "Sites": [{"id": 1, "name": "HQ", "sortOrder": "3"}],
        "categories": [{"id": 5, "name": "Furniture"}],
        "assets": [{
            "id": 10,
            "noAsset": "0001/I/003",
            "name": "Desk",
            "status": "lost",
            "cost": "1500000.50",
            "siteId": 1,
            "categoryId": "5",
            "purchaseDate": "2021-03-04"
        }]
    }));

    let report = app.state.services.backup.restore(&archive).await.unwrap();
    assert_eq!(report.engine, EngineKind::Sql);
    assert_eq!(report.total, 3);

    let asset = app
        .state
        .services
        .assets
        .find_by_number("0001/I/003")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.id, mapped_id("assets", "10"));
    assert_eq!(asset.site_id, Some(mapped_id("sites", "1")));
    assert_eq!(asset.category_id, Some(mapped_id("categories", "5")));
    assert_eq!(asset.status.to_string(), "Lost/Missing");

    let site = app
        .state
        .services
        .lookups
        .get(LookupKind::Site, mapped_id("sites", "1"))
        .await
        .unwrap();
    assert_eq!(site.sort_order, 3);
}

#[tokio::test]
async fn bad_rows_fail_before_anything_is_deleted() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    app.seed_asset("A-1", "Desk").await;

    let archive = archive_of(json!({"assets": [{"id": 1, "name": "No number"}]}));
    let zip = backup::archive::write_archive(&archive).unwrap();
    let response = app
        .request_bytes(Method::POST, "/api/backup/import", "application/zip", zip, &token)
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["message"]
        .as_str()
        .unwrap()
        .contains("no_asset"));

    assert!(app
        .state
        .services
        .assets
        .find_by_number("A-1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn uploads_that_are_not_archives_are_rejected() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;

    let not_zip = app
        .request_bytes(
            Method::POST,
            "/api/backup/import",
            "application/zip",
            b"definitely not a zip".to_vec(),
            &token,
        )
        .await;
    assert_eq!(not_zip.status(), StatusCode::BAD_REQUEST);

    let empty = app
        .request_bytes(Method::POST, "/api/backup/import", "application/zip", Vec::new(), &token)
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let body = b"--x\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhi\r\n--x--\r\n";
    let wrong_field = app
        .request_bytes(
            Method::POST,
            "/api/backup/import",
            "multipart/form-data; boundary=x",
            body.to_vec(),
            &token,
        )
        .await;
    assert_eq!(wrong_field.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn remote_engine_replaces_tables_and_skips_missing_ones() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/assets"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"code": "PGRST205", "message": "Could not find the table"})),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(header_is("apikey", "service-key"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sites"))
        .and(header_is("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(201))
        // Three rows in batches of two
        .expect(2)
        .mount(&server)
        .await;

    let app = TestApp::new().await;
    let service = remote_service(&app, &server, BackupPreference::Remote);
    let archive = archive_of(json!({
        "sites": [
            {"id": 1, "name": "HQ"},
            {"id": 2, "name": "Branch"},
            {"id": 3, "name": "Warehouse"}
        ],
        "assets": [{"id": 1, "no_asset": "A-1", "name": "Desk", "site_id": 1}]
    }));

    let report = service.restore(&archive).await.unwrap();
    assert_eq!(report.engine, EngineKind::Remote);
    assert_eq!(report.total, 3);
    let assets = report.tables.iter().find(|t| t.table == "assets").unwrap();
    assert!(assets.skipped);
    let sites = report.tables.iter().find(|t| t.table == "sites").unwrap();
    assert_eq!(sites.inserted, 3);
    server.verify().await;

    // The remote store took the data; the local database is untouched.
    assert!(app.state.services.lookups.list(LookupKind::Site).await.unwrap().is_empty());
}

#[tokio::test]
async fn failing_remote_store_falls_back_to_sql() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let app = TestApp::new().await;
    let service = remote_service(&app, &server, BackupPreference::Remote);
    let archive = archive_of(json!({"sites": [{"id": 1, "name": "HQ"}]}));

    let report = service.restore(&archive).await.unwrap();
    assert_eq!(report.engine, EngineKind::Sql);
    assert_eq!(app.state.services.lookups.list(LookupKind::Site).await.unwrap().len(), 1);
}

#[tokio::test]
async fn restores_running_past_the_time_budget_are_cut_off() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut cfg = common::test_config();
    cfg.backup_prefer = BackupPreference::Remote;
    cfg.backup_remote_url = Some(server.uri());
    cfg.backup_remote_key = Some("service-key".into());
    cfg.backup_max_duration_secs = 1;
    cfg.backup_remote_timeout_secs = 30;
    let app = TestApp::with_config(cfg).await;
    let token = app.admin_token().await;

    let archive = archive_of(json!({"sites": [{"id": 1, "name": "HQ"}]}));
    let zip = backup::archive::write_archive(&archive).unwrap();
    let response = app
        .request_bytes(Method::POST, "/api/backup/import", "application/zip", zip, &token)
        .await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn archive_entries_over_the_size_limit_are_refused() {
    let mut cfg = common::test_config();
    cfg.backup_max_entry_bytes = 1024;
    let app = TestApp::with_config(cfg).await;
    let token = app.admin_token().await;
    app.seed_asset("A-1", "Desk").await;

    let archive = archive_of(json!({"sites": [{"id": 1, "name": "x".repeat(4096)}]}));
    let zip = backup::archive::write_archive(&archive).unwrap();
    let response = app
        .request_bytes(Method::POST, "/api/backup/import", "application/zip", zip, &token)
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app
        .state
        .services
        .assets
        .find_by_number("A-1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn snapshot_lists_every_table_in_restore_order() {
    let app = TestApp::new().await;
    app.seed_asset("A-1", "Desk").await;
    let snapshot = app.state.services.backup.snapshot().await.unwrap();

    let tables = snapshot.metadata.tables.clone().unwrap();
    assert_eq!(tables.first().map(String::as_str), Some("sites"));
    assert!(tables.iter().position(|t| t == "assets") < tables.iter().position(|t| t == "so_sessions"));
    let assets = snapshot.database["assets"].as_array().unwrap();
    assert_eq!(assets.len(), 1);
    let _: &Map<String, Value> = assets[0].as_object().unwrap();
}
