//! Inventory item model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: u64,
    pub product_id: u64,
    pub name: String,
    pub quantity: u32,
    pub last_updated: DateTime<Utc>,
}

/// Input for adding a stock line. `name` defaults to the catalog product name.
#[derive(Debug, Clone)]
pub struct CreateInventoryItem {
    pub product_id: u64,
    pub name: Option<String>,
    pub quantity: u32,
}
