//! Application startup and lifecycle management.

use crate::config::{LedgerConfig, StorageBackend};
use crate::handlers::{
    analytics, backups, bills, health, inventory, orders, payments, products, wallets,
};
use crate::services::{
    init_metrics, spawn_backup_scheduler, BackupManager, CommitGate, DocumentStore,
    InventoryService, JsonFileStore, Ledger, MemoryStore, ProductCatalog, WalletService,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: LedgerConfig,
    pub store: Arc<dyn DocumentStore>,
    pub catalog: Arc<ProductCatalog>,
    pub ledger: Arc<Ledger>,
    pub wallets: Arc<WalletService>,
    pub inventory: Arc<InventoryService>,
    pub backups: Arc<BackupManager>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_handler))
        // Monthly billing
        .route("/api/monthly-bills", get(bills::list_bills))
        .route("/api/monthly-bills/generate", post(bills::generate_bills))
        .route("/api/monthly-bills/:bill_id", get(bills::get_bill))
        .route("/api/monthly-bills/:bill_id/pay", post(bills::pay_bill))
        .route("/api/payments", get(payments::list_payments))
        .route("/api/dues/summary", get(payments::dues_summary))
        .route("/api/analytics/customers", get(analytics::customer_analytics))
        // Catalog
        .route("/api/products", get(products::list_products))
        .route("/api/products/:id", get(products::get_product))
        // Orders
        .route(
            "/api/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route(
            "/api/orders/:id",
            get(orders::get_order).put(orders::update_order),
        )
        // Wallets
        .route("/api/wallets/:user_id", get(wallets::get_wallet))
        .route(
            "/api/wallets/:user_id/transactions",
            get(wallets::list_transactions),
        )
        .route("/api/wallets/:user_id/credit", post(wallets::credit))
        .route("/api/wallets/:user_id/debit", post(wallets::debit))
        // Inventory
        .route(
            "/api/inventory",
            get(inventory::list_items).post(inventory::add_item),
        )
        .route("/api/inventory/low-stock", get(inventory::low_stock))
        .route("/api/inventory/:id", axum::routing::put(inventory::update_item))
        // Backups
        .route(
            "/api/backups",
            get(backups::list_backups).post(backups::create_backup),
        )
        .route("/api/backups/:name/restore", post(backups::restore_backup))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Open the store, load every service and bind the HTTP listener.
    pub async fn build(config: LedgerConfig) -> Result<Self, AppError> {
        init_metrics();

        let store: Arc<dyn DocumentStore> = match config.storage.backend {
            StorageBackend::Json => Arc::new(
                JsonFileStore::open(&config.storage.data_dir)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, "Failed to open data directory");
                        e
                    })?,
            ),
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on shutdown");
                Arc::new(MemoryStore::new())
            }
        };

        // One gate for every service sharing the store.
        let gate = CommitGate::new();
        let catalog = Arc::new(ProductCatalog::default());
        let ledger = Arc::new(
            Ledger::open(store.clone(), config.billing.clone())
                .await?
                .with_gate(gate.clone()),
        );
        let wallets = Arc::new(
            WalletService::open(store.clone())
                .await?
                .with_gate(gate.clone()),
        );
        let inventory = Arc::new(
            InventoryService::open(
                store.clone(),
                catalog.clone(),
                config.inventory.low_stock_threshold,
            )
            .await?
            .with_gate(gate.clone()),
        );
        let backups = Arc::new(BackupManager::new(
            store.clone(),
            gate,
            &config.backup.dir,
            config.backup.retain,
            ledger.clone(),
            wallets.clone(),
            inventory.clone(),
        ));

        let state = AppState {
            config: config.clone(),
            store,
            catalog,
            ledger,
            wallets,
            inventory,
            backups,
        };

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Dairy ledger listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve requests and run the backup scheduler until the server stops.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let shutdown = CancellationToken::new();
        // Stops the scheduler even when this future is dropped mid-serve.
        let _cancel_on_drop = shutdown.clone().drop_guard();
        let scheduler = spawn_backup_scheduler(
            self.state.backups.clone(),
            Duration::from_secs(self.state.config.backup.interval_secs),
            shutdown.clone(),
        );

        tracing::info!(
            service = "dairy-ledger",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        let result = axum::serve(self.listener, router(self.state)).await;

        shutdown.cancel();
        if let Some(handle) = scheduler {
            let _ = handle.await;
        }

        result.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
