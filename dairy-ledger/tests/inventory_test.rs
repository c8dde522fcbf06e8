//! Inventory endpoint integration tests.

mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn add_update_and_low_stock() {
    let app = TestApp::spawn().await;

    for (product_id, name, quantity) in [(1, "Fresh Milk", 100), (2, "Ghee", 12), (3, "Curd", 60)] {
        let response = app
            .post(
                "/api/inventory",
                json!({ "productId": product_id, "name": name, "quantity": quantity }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
    }

    let items: Vec<Value> = app.get("/api/inventory").await.json().await.unwrap();
    assert_eq!(items.len(), 3);

    let low: Vec<Value> = app
        .get("/api/inventory/low-stock")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0]["name"], "Ghee");

    let response = app.put("/api/inventory/3", json!({ "quantity": 5 })).await;
    assert_eq!(response.status().as_u16(), 200);
    let curd: Value = response.json().await.unwrap();
    assert_eq!(curd["quantity"], 5);

    let low: Vec<Value> = app
        .get("/api/inventory/low-stock?threshold=10")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0]["id"], 3);

    let response = app.put("/api/inventory/99", json!({ "quantity": 1 })).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn stock_lines_reference_the_catalog() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/api/inventory", json!({ "productId": 42, "quantity": 10 }))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post("/api/inventory", json!({ "productId": 7, "quantity": 10 }))
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let item: Value = response.json().await.unwrap();
    assert_eq!(item["name"], "Greek Yogurt");
}
