//! Test helper module for dairy-ledger integration tests.
//!
//! Each app gets its own temporary data and backup directories.

#![allow(dead_code)]

use dairy_ledger::config::{
    BackupConfig, BillingSettings, InventoryConfig, LedgerConfig, StorageBackend, StorageConfig,
};
use dairy_ledger::services::init_metrics;
use dairy_ledger::startup::Application;
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use tempfile::TempDir;

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub data_dir: TempDir,
}

pub fn test_config(data_dir: &TempDir) -> LedgerConfig {
    LedgerConfig {
        common: CoreConfig::with_port(0), // Random port
        service_name: "dairy-ledger-test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        storage: StorageConfig {
            backend: StorageBackend::Json,
            data_dir: data_dir.path().join("data"),
        },
        backup: BackupConfig {
            dir: data_dir.path().join("backups"),
            interval_secs: 0,
            retain: 7,
        },
        billing: BillingSettings::default(),
        inventory: InventoryConfig {
            low_stock_threshold: 20,
        },
    }
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with a tweaked configuration.
    pub async fn spawn_with(customize: impl FnOnce(&mut LedgerConfig)) -> Self {
        let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = test_config(&data_dir);
        customize(&mut config);
        Self::spawn_in(data_dir, config).await
    }

    /// Spawn on an existing data directory, e.g. to check persistence.
    pub async fn spawn_in(data_dir: TempDir, config: LedgerConfig) -> Self {
        init_metrics();

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            data_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a single-item order dated `created_at` (RFC 3339).
    pub async fn create_order(
        &self,
        customer_id: u64,
        customer_name: &str,
        price: &str,
        created_at: &str,
    ) -> Value {
        let response = self
            .post(
                "/api/orders",
                json!({
                    "customerId": customer_id,
                    "customerName": customer_name,
                    "items": [{ "name": "Fresh Milk", "quantity": 1, "price": price }],
                    "createdAt": created_at,
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Failed to parse order")
    }

    pub async fn generate(&self, month: u32, year: i32) -> reqwest::Response {
        self.post(
            "/api/monthly-bills/generate",
            json!({ "month": month, "year": year }),
        )
        .await
    }
}

/// Decimal strings compare numerically ("500.00" == "500").
pub fn money(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().expect("Not a decimal string"),
        Value::Number(n) => n.as_f64().expect("Not a number"),
        other => panic!("Not a money value: {}", other),
    }
}
