//! Assets, lookups, employees and check-outs over HTTP.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{body_bytes, body_json, TestApp};
use opname_api::services::lookups::LookupKind;
use serde_json::json;

#[tokio::test]
async fn asset_numbers_follow_category_and_site_order() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    app.seed_lookup(LookupKind::Category, "Furniture").await;
    let electronics = app.seed_lookup(LookupKind::Category, "Electronics").await;
    let hq = app.seed_lookup(LookupKind::Site, "HQ").await;

    let preview = app
        .request(
            Method::GET,
            &format!(
                "/api/assets/generate-number?category_id={}&site_id={}&prefix=IT",
                electronics, hq
            ),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(preview.status(), StatusCode::OK);
    assert_eq!(body_json(preview).await["no_asset"], "IT/II/001");

    let created = app
        .request(
            Method::POST,
            "/api/assets",
            Some(json!({"name": "Monitor", "category_id": electronics, "site_id": hq})),
            Some(&token),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(body_json(created).await["no_asset"], "0001/II/001");

    let next = app
        .request(
            Method::POST,
            "/api/assets",
            Some(json!({"name": "Keyboard", "category_id": electronics, "site_id": hq})),
            Some(&token),
        )
        .await;
    assert_eq!(body_json(next).await["no_asset"], "0002/II/001");
}

#[tokio::test]
async fn duplicate_asset_numbers_conflict() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    app.seed_asset("A-1", "Desk").await;

    let response = app
        .request(
            Method::POST,
            "/api/assets",
            Some(json!({"no_asset": "A-1", "name": "Another desk"})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn asset_detail_exposes_json_notes_as_fields() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let created = body_json(
        app.request(
            Method::POST,
            "/api/assets",
            Some(json!({
                "no_asset": "A-9",
                "name": "Projector",
                "notes": "{\"lumens\": 3000, \"room\": \"B2\"}"
            })),
            Some(&token),
        )
        .await,
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let detail = body_json(
        app.request(Method::GET, &format!("/api/assets/{}", id), None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(detail["no_asset"], "A-9");
    assert_eq!(detail["additional_fields"]["lumens"], "3000");
    assert_eq!(detail["additional_fields"]["room"], "B2");
}

#[tokio::test]
async fn asset_list_is_paginated_and_searchable() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    for i in 1..=5 {
        app.seed_asset(&format!("A-{}", i), &format!("Chair {}", i)).await;
    }
    app.seed_asset("B-1", "Table").await;

    let page = body_json(
        app.request(Method::GET, "/api/assets?page=2&per_page=2", None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["pagination"]["total"], 6);
    assert_eq!(page["pagination"]["total_pages"], 3);

    let search = body_json(
        app.request(Method::GET, "/api/assets?search=Table", None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(search["pagination"]["total"], 1);
    assert_eq!(search["data"][0]["no_asset"], "B-1");
}

#[tokio::test]
async fn lookups_reorder_and_refuse_deletion_while_in_use() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let a = app.seed_lookup(LookupKind::Site, "Jakarta").await;
    let b = app.seed_lookup(LookupKind::Site, "Bandung").await;
    let c = app.seed_lookup(LookupKind::Site, "Surabaya").await;

    let reordered = app
        .request(
            Method::PUT,
            "/api/sites/reorder",
            Some(json!({"ids": [c, a, b]})),
            Some(&token),
        )
        .await;
    assert_eq!(reordered.status(), StatusCode::OK);
    let list = body_json(app.request(Method::GET, "/api/sites", None, Some(&token)).await).await;
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Surabaya", "Jakarta", "Bandung"]);

    let duplicate = app
        .request(
            Method::PUT,
            "/api/sites/reorder",
            Some(json!({"ids": [a, a]})),
            Some(&token),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let asset = app
        .request(
            Method::POST,
            "/api/assets",
            Some(json!({"no_asset": "A-1", "name": "Desk", "site_id": a})),
            Some(&token),
        )
        .await;
    assert_eq!(asset.status(), StatusCode::CREATED);

    let in_use = app
        .request(Method::DELETE, &format!("/api/sites/{}", a), None, Some(&token))
        .await;
    assert_eq!(in_use.status(), StatusCode::BAD_REQUEST);

    let unused = app
        .request(Method::DELETE, &format!("/api/sites/{}", b), None, Some(&token))
        .await;
    assert_eq!(unused.status(), StatusCode::NO_CONTENT);

    let same_name = app
        .request(Method::POST, "/api/categories", Some(json!({"name": "Jakarta"})), Some(&token))
        .await;
    assert_eq!(same_name.status(), StatusCode::CREATED);
    let clash = app
        .request(Method::POST, "/api/sites", Some(json!({"name": "Jakarta"})), Some(&token))
        .await;
    assert_eq!(clash.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn asset_csv_round_trips_through_export_and_import() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    app.seed_asset("A-1", "Desk, oak").await;

    let export = app.request(Method::GET, "/api/assets/export", None, Some(&token)).await;
    assert_eq!(export.status(), StatusCode::OK);
    assert!(export.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let text = String::from_utf8(body_bytes(export).await).unwrap();
    assert!(text.starts_with("noAsset,name,"));
    assert!(text.contains("\"Desk, oak\""));

    let edited = format!(
        "{}A-2,Whiteboard,,250000,Active,,,,,,,\nA-3,,,,,,,,,,,\n",
        text.replace("Desk, oak", "Desk, walnut")
    );
    let import = app
        .request_bytes(
            Method::POST,
            "/api/assets/import",
            "text/csv",
            edited.into_bytes(),
            &token,
        )
        .await;
    assert_eq!(import.status(), StatusCode::OK);
    let report = body_json(import).await;
    assert_eq!(report["created"], 1);
    assert_eq!(report["updated"], 1);
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);
    assert_eq!(report["errors"][0]["line"], 4);

    let desk = app
        .state
        .services
        .assets
        .find_by_number("A-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(desk.name, "Desk, walnut");
}

#[tokio::test]
async fn employee_import_upserts_on_code() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let csv = "employeeCode,name,email,isActive\nE-1,Ani,ani@example.com,true\nE-2,Budi,,false\n";
    let first = body_json(
        app.request_bytes(
            Method::POST,
            "/api/employees/import",
            "text/csv",
            csv.as_bytes().to_vec(),
            &token,
        )
        .await,
    )
    .await;
    assert_eq!(first["created"], 2);

    let again = body_json(
        app.request_bytes(
            Method::POST,
            "/api/employees/import",
            "text/csv",
            b"employeeCode,name\nE-1,Ani Lestari\n".to_vec(),
            &token,
        )
        .await,
    )
    .await;
    assert_eq!(again["created"], 0);
    assert_eq!(again["updated"], 1);

    let list = body_json(app.request(Method::GET, "/api/employees", None, Some(&token)).await).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().any(|e| e["name"] == "Ani Lestari"));
}

#[tokio::test]
async fn an_asset_is_checked_out_once_at_a_time() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let asset = app.seed_asset("A-1", "Laptop").await;

    let first = app
        .request(
            Method::POST,
            "/api/check-outs",
            Some(json!({"asset_id": asset.id, "assigned_to": "Citra"})),
            Some(&token),
        )
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let checkout = body_json(first).await;
    assert_eq!(checkout["status"], "OUT");
    let id = checkout["id"].as_str().unwrap().to_string();

    let second = app
        .request(
            Method::POST,
            "/api/check-outs",
            Some(json!({"asset_id": asset.id, "assigned_to": "Dedi"})),
            Some(&token),
        )
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let returned = app
        .request(
            Method::POST,
            &format!("/api/check-outs/{}/check-in", id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(returned.status(), StatusCode::OK);
    let returned = body_json(returned).await;
    assert_eq!(returned["status"], "RETURNED");
    assert!(!returned["return_date"].is_null());

    let twice = app
        .request(
            Method::POST,
            &format!("/api/check-outs/{}/check-in", id),
            Some(json!({})),
            Some(&token),
        )
        .await;
    assert_eq!(twice.status(), StatusCode::BAD_REQUEST);

    let again = app
        .request(
            Method::POST,
            "/api/check-outs",
            Some(json!({"asset_id": asset.id, "assigned_to": "Dedi"})),
            Some(&token),
        )
        .await;
    assert_eq!(again.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn references_to_missing_lookups_are_rejected() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;

    let response = app
        .request(
            Method::POST,
            "/api/assets",
            Some(json!({
                "no_asset": "A-1",
                "name": "Desk",
                "site_id": uuid::Uuid::new_v4()
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app
        .state
        .services
        .assets
        .find_by_number("A-1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn deleting_an_asset_takes_its_returned_checkouts_along() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let asset = app.seed_asset("A-1", "Laptop").await;

    let checkout = body_json(
        app.request(
            Method::POST,
            "/api/check-outs",
            Some(json!({"asset_id": asset.id, "assigned_to": "Citra"})),
            Some(&token),
        )
        .await,
    )
    .await;
    let id = checkout["id"].as_str().unwrap().to_string();
    app.request(
        Method::POST,
        &format!("/api/check-outs/{}/check-in", id),
        None,
        Some(&token),
    )
    .await;

    let deleted = app
        .request(Method::DELETE, &format!("/api/assets/{}", asset.id), None, Some(&token))
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let history = app
        .request(Method::GET, &format!("/api/check-outs/{}", id), None, Some(&token))
        .await;
    assert_eq!(history.status(), StatusCode::NOT_FOUND);
}
