//! Product catalog and analytics endpoint integration tests.

mod common;

use common::{money, TestApp};
use serde_json::Value;

#[tokio::test]
async fn product_catalog_is_served() {
    let app = TestApp::spawn().await;

    let products: Vec<Value> = app.get("/api/products").await.json().await.unwrap();
    assert_eq!(products.len(), 7);
    assert_eq!(products[0]["id"], 1);
    assert_eq!(products[0]["name"], "Fresh Milk");

    let curd: Value = app.get("/api/products/2").await.json().await.unwrap();
    assert_eq!(money(&curd["price"]), 6.99);

    assert_eq!(app.get("/api/products/99").await.status().as_u16(), 404);
}

#[tokio::test]
async fn customer_analytics_summarises_orders() {
    let app = TestApp::spawn().await;
    app.create_order(1, "John Doe", "10.00", "2025-01-03T08:00:00Z")
        .await;
    app.create_order(1, "John Doe", "15.00", "2025-01-09T08:00:00Z")
        .await;
    app.create_order(2, "Jane Smith", "40.00", "2025-01-04T08:00:00Z")
        .await;

    let analytics: Value = app
        .get("/api/analytics/customers?top=1")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(analytics["totalCustomers"], 2);
    assert_eq!(analytics["repeatCustomers"], 1);
    assert_eq!(money(&analytics["totalRevenue"]), 65.0);
    let top = analytics["topCustomers"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["customerId"], 2);

    let response = app.get("/api/analytics/customers?top=0").await;
    assert_eq!(response.status().as_u16(), 422);
}
