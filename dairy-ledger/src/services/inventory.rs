//! Stock levels per product.

use crate::models::{CreateInventoryItem, InventoryItem};
use crate::services::catalog::ProductCatalog;
use crate::services::metrics::record_error;
use crate::services::store::{
    load_json, CommitGate, DocumentStore, StoreError, WriteBatch, INVENTORY,
};
use chrono::Utc;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Inventory item {0} not found")]
    ItemNotFound(u64),

    #[error("Invalid inventory item: {0}")]
    InvalidItem(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::ItemNotFound(_) => AppError::NotFound(anyhow::Error::new(err)),
            InventoryError::InvalidItem(_) => AppError::BadRequest(anyhow::Error::new(err)),
            InventoryError::Persistence(e) => e.into(),
        }
    }
}

pub struct InventoryService {
    store: Arc<dyn DocumentStore>,
    gate: CommitGate,
    catalog: Arc<ProductCatalog>,
    low_stock_threshold: u32,
    items: Mutex<Vec<InventoryItem>>,
}

impl InventoryService {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        catalog: Arc<ProductCatalog>,
        low_stock_threshold: u32,
    ) -> Result<Self, InventoryError> {
        let items: Vec<InventoryItem> = load_json(store.as_ref(), INVENTORY)
            .await?
            .unwrap_or_default();
        info!(items = items.len(), "Inventory loaded");
        Ok(Self {
            store,
            gate: CommitGate::new(),
            catalog,
            low_stock_threshold,
            items: Mutex::new(items),
        })
    }

    pub fn with_gate(mut self, gate: CommitGate) -> Self {
        self.gate = gate;
        self
    }

    /// Swap in an inventory collection that is already committed to the store.
    pub async fn install(&self, items: Vec<InventoryItem>) {
        *self.items.lock().await = items;
    }

    pub async fn list_items(&self) -> Vec<InventoryItem> {
        self.items.lock().await.clone()
    }

    #[instrument(skip(self, input), fields(product_id = input.product_id))]
    pub async fn add_item(&self, input: CreateInventoryItem) -> Result<InventoryItem, InventoryError> {
        let product = self.catalog.get(input.product_id).map_err(|e| {
            record_error("unknown_product", "inventory");
            InventoryError::InvalidItem(e.to_string())
        })?;
        // Stock lines are named after the product unless a label is given.
        let name = match input.name {
            Some(name) if name.trim().is_empty() => {
                return Err(InventoryError::InvalidItem("name cannot be blank".to_string()))
            }
            Some(name) => name,
            None => product.name.clone(),
        };

        let _permit = self.gate.shared().await;
        let mut items = self.items.lock().await;
        let item = InventoryItem {
            id: items.iter().map(|i| i.id).max().unwrap_or(0) + 1,
            product_id: input.product_id,
            name,
            quantity: input.quantity,
            last_updated: Utc::now(),
        };

        let mut next = items.clone();
        next.push(item.clone());
        self.persist(&next).await?;
        *items = next;

        info!(item_id = item.id, quantity = item.quantity, "Inventory item added");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        id: u64,
        quantity: u32,
    ) -> Result<InventoryItem, InventoryError> {
        let _permit = self.gate.shared().await;
        let mut items = self.items.lock().await;
        let index = items
            .iter()
            .position(|i| i.id == id)
            .ok_or(InventoryError::ItemNotFound(id))?;

        let mut next = items.clone();
        next[index].quantity = quantity;
        next[index].last_updated = Utc::now();
        let updated = next[index].clone();

        self.persist(&next).await?;
        *items = next;

        info!(item_id = id, quantity = quantity, "Inventory quantity updated");
        Ok(updated)
    }

    /// Items whose quantity is below `threshold` (the configured default when
    /// `None`), lowest stock first.
    pub async fn low_stock(&self, threshold: Option<u32>) -> Vec<InventoryItem> {
        let threshold = threshold.unwrap_or(self.low_stock_threshold);
        let mut low: Vec<InventoryItem> = self
            .items
            .lock()
            .await
            .iter()
            .filter(|i| i.quantity < threshold)
            .cloned()
            .collect();
        low.sort_by_key(|i| (i.quantity, i.id));
        low
    }

    async fn persist(&self, items: &[InventoryItem]) -> Result<(), InventoryError> {
        let mut batch = WriteBatch::new();
        batch.put_json(INVENTORY, items)?;
        self.store.commit(batch).await.inspect_err(|_| {
            record_error("persistence_failure", "inventory");
        })?;
        Ok(())
    }
}
