//! Customer order model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order fulfilment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Line item of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

impl OrderItem {
    /// `price × quantity`, or `None` when the product does not fit a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// A customer order. Immutable after creation apart from `status` and the
/// `bill_id`/`billed_at` tag applied when a monthly bill consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    pub customer_id: u64,
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_billed(&self) -> bool {
        self.bill_id.is_some()
    }
}

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub customer_id: u64,
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Filter parameters for listing orders.
#[derive(Debug, Clone, Default)]
pub struct ListOrdersFilter {
    pub customer_id: Option<u64>,
    pub status: Option<OrderStatus>,
    pub billed: Option<bool>,
}

impl ListOrdersFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.customer_id.is_none_or(|c| order.customer_id == c)
            && self.status.is_none_or(|s| order.status == s)
            && self.billed.is_none_or(|b| order.is_billed() == b)
    }
}
