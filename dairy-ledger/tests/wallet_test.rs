//! Wallet endpoint integration tests.

mod common;

use common::{money, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn credit_debit_and_history() {
    let app = TestApp::spawn().await;

    let wallet: Value = app.get("/api/wallets/cust-1").await.json().await.unwrap();
    assert_eq!(money(&wallet["balance"]), 0.0);

    let response = app
        .post(
            "/api/wallets/cust-1/credit",
            json!({ "amount": "250.00", "paymentMethod": "upi", "reference": "UPI-881" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let credit: Value = response.json().await.unwrap();
    assert_eq!(credit["type"], "CREDIT");
    assert_eq!(money(&credit["balance"]), 250.0);

    let response = app
        .post("/api/wallets/cust-1/debit", json!({ "amount": 70 }))
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let debit: Value = response.json().await.unwrap();
    assert_eq!(debit["type"], "DEBIT");
    assert_eq!(money(&debit["balance"]), 180.0);

    let history: Vec<Value> = app
        .get("/api/wallets/cust-1/transactions")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 2);

    let wallet: Value = app.get("/api/wallets/cust-1").await.json().await.unwrap();
    assert_eq!(money(&wallet["balance"]), 180.0);
}

#[tokio::test]
async fn debit_errors() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/api/wallets/nobody/debit", json!({ "amount": 1 }))
        .await;
    assert_eq!(response.status().as_u16(), 404);

    app.post("/api/wallets/cust-2/credit", json!({ "amount": 10 }))
        .await;
    let response = app
        .post("/api/wallets/cust-2/debit", json!({ "amount": 11 }))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post("/api/wallets/cust-2/credit", json!({ "amount": 0 }))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn oversized_credit_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/api/wallets/cust-9/credit",
            json!({ "amount": "79228162514264337593543950335" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let wallet: Value = app.get("/api/wallets/cust-9").await.json().await.unwrap();
    assert_eq!(money(&wallet["balance"]), 0.0);
}
