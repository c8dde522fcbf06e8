//! Order endpoint integration tests.

mod common;

use common::{money, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn create_and_fetch_order() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/api/orders",
            json!({
                "customerId": 4,
                "customerName": "Meera",
                "items": [
                    { "name": "Paneer", "quantity": 2, "price": "4.25" },
                    { "name": "Buttermilk", "quantity": 3, "price": 1.5 }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let order: Value = response.json().await.unwrap();
    assert_eq!(order["id"], 1);
    assert_eq!(order["status"], "pending");
    assert_eq!(money(&order["subtotal"]), 13.0);
    assert_eq!(money(&order["total"]), 13.0);
    assert!(order.get("billId").is_none());

    let fetched: Value = app.get("/api/orders/1").await.json().await.unwrap();
    assert_eq!(fetched["customerName"], "Meera");

    assert_eq!(app.get("/api/orders/42").await.status().as_u16(), 404);
}

#[tokio::test]
async fn invalid_orders_are_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/api/orders",
            json!({ "customerId": 1, "customerName": "John Doe", "items": [] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let response = app
        .post(
            "/api/orders",
            json!({
                "customerId": 1,
                "customerName": "John Doe",
                "items": [{ "name": "Milk", "quantity": 1, "price": "-2" }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn status_update_and_filters() {
    let app = TestApp::spawn().await;
    app.create_order(1, "John Doe", "10.00", "2025-03-01T08:00:00Z")
        .await;
    app.create_order(2, "Jane Smith", "20.00", "2025-03-02T08:00:00Z")
        .await;

    let response = app
        .put("/api/orders/2", json!({ "status": "completed" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "completed");

    let all: Vec<Value> = app.get("/api/orders").await.json().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0]["id"], 2);

    let completed: Vec<Value> = app
        .get("/api/orders?status=completed")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);

    let customer: Vec<Value> = app
        .get("/api/orders?customerId=1")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(customer.len(), 1);
    assert_eq!(customer[0]["customerName"], "John Doe");
}

#[tokio::test]
async fn out_of_range_prices_are_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/api/orders",
            json!({
                "customerId": 1,
                "customerName": "John Doe",
                "items": [{ "name": "Milk", "quantity": 2, "price": "79228162514264337593543950335" }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let orders: Vec<Value> = app.get("/api/orders").await.json().await.unwrap();
    assert!(orders.is_empty());
    assert_eq!(app.get("/health").await.status().as_u16(), 200);
}
