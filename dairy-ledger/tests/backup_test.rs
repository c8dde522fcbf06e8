//! Backup endpoint integration tests.

mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn backup_and_restore() {
    let app = TestApp::spawn().await;
    app.create_order(1, "John Doe", "120.00", "2025-01-05T08:00:00Z")
        .await;

    let response = app.post("/api/backups", json!({})).await;
    assert_eq!(response.status().as_u16(), 201);
    let backup: Value = response.json().await.unwrap();
    let name = backup["name"].as_str().unwrap().to_string();
    assert!(name.starts_with("backup-"));

    app.create_order(2, "Jane Smith", "80.00", "2025-01-06T08:00:00Z")
        .await;
    app.generate(1, 2025).await;

    let listed: Vec<Value> = app.get("/api/backups").await.json().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], name.as_str());

    let response = app
        .post(&format!("/api/backups/{}/restore", name), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let orders: Vec<Value> = app.get("/api/orders").await.json().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert!(orders[0].get("billId").is_none());

    let bills: Vec<Value> = app.get("/api/monthly-bills").await.json().await.unwrap();
    assert!(bills.is_empty());
}

#[tokio::test]
async fn restore_rejects_unknown_and_bad_names() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/api/backups/backup-1999-01-01T00-00-00-000Z/restore", json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app
        .post("/api/backups/snapshot-1/restore", json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn malformed_snapshot_keeps_live_data() {
    let app = TestApp::spawn().await;
    app.create_order(1, "John Doe", "120.00", "2025-01-05T08:00:00Z")
        .await;

    let backup: Value = app
        .post("/api/backups", json!({}))
        .await
        .json()
        .await
        .unwrap();
    let name = backup["name"].as_str().unwrap().to_string();
    let snapshot = app
        .data_dir
        .path()
        .join("backups")
        .join(&name)
        .join("monthly_bills.json");
    std::fs::write(&snapshot, r#"[{"billId": 7}]"#).unwrap();

    let response = app
        .post(&format!("/api/backups/{}/restore", name), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let orders: Vec<Value> = app.get("/api/orders").await.json().await.unwrap();
    assert_eq!(orders.len(), 1);
    let response = app.generate(1, 2025).await;
    assert_eq!(response.status().as_u16(), 201);
}
