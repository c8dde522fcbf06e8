//! Request and response bodies for the HTTP API.

use crate::models::{
    BillStatus, CreateInventoryItem, CreateOrder, ListBillsFilter, ListOrdersFilter,
    ListPaymentsFilter, MonthlyBill, OrderItem, OrderStatus, Payment, RecordPayment,
};
use crate::services::TransactionDetails;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Largest price or wallet movement accepted over HTTP.
pub const MAX_MONEY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

fn within_money_cap(value: &Decimal) -> Result<(), ValidationError> {
    if *value > MAX_MONEY {
        let mut err = ValidationError::new("money_out_of_range");
        err.message = Some(format!("Amount must not exceed {}", MAX_MONEY).into());
        return Err(err);
    }
    Ok(())
}

// =============================================================================
// Monthly bills
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBillsRequest {
    #[validate(range(min = 1, max = 12, message = "Month must be between 1 and 12"))]
    pub month: u32,
    #[validate(range(min = 2000, max = 2100, message = "Year must be between 2000 and 2100"))]
    pub year: i32,
    pub customer_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBillsResponse {
    pub bills: Vec<MonthlyBill>,
    pub total_bills: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBillsQuery {
    pub customer_id: Option<u64>,
    pub status: Option<BillStatus>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl From<ListBillsQuery> for ListBillsFilter {
    fn from(q: ListBillsQuery) -> Self {
        ListBillsFilter {
            customer_id: q.customer_id,
            status: q.status,
            month: q.month,
            year: q.year,
        }
    }
}

/// A bill as returned by read endpoints, with the overdue label and the late
/// fee it currently carries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillResponse {
    #[serde(flatten)]
    pub bill: MonthlyBill,
    pub effective_status: BillStatus,
    pub overdue_fee: Decimal,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PayBillRequest {
    pub amount: Option<Decimal>,
    #[validate(length(min = 1, max = 50, message = "Payment method must be 1-50 characters"))]
    pub payment_method: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl From<PayBillRequest> for RecordPayment {
    fn from(r: PayBillRequest) -> Self {
        RecordPayment {
            amount: r.amount,
            payment_method: r.payment_method,
            notes: r.notes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayBillResponse {
    pub payment: Payment,
    pub updated_bill: MonthlyBill,
}

// =============================================================================
// Payments and dues
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPaymentsQuery {
    pub customer_id: Option<u64>,
    pub bill_id: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl From<ListPaymentsQuery> for ListPaymentsFilter {
    fn from(q: ListPaymentsQuery) -> Self {
        ListPaymentsFilter {
            customer_id: q.customer_id,
            bill_id: q.bill_id,
            month: q.month,
            year: q.year,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuesQuery {
    pub customer_id: Option<u64>,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    #[validate(length(min = 1, message = "Item name cannot be empty"))]
    pub name: String,
    #[validate(range(min = 1, max = 100000, message = "Quantity must be between 1 and 100000"))]
    pub quantity: u32,
    #[validate(custom(function = "within_money_cap"))]
    pub price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_id: u64,
    #[validate(length(min = 1, message = "Customer name cannot be empty"))]
    pub customer_name: String,
    #[validate(length(min = 1, message = "Order needs at least one item"), nested)]
    pub items: Vec<OrderItemRequest>,
    /// Backdated orders are accepted; defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

impl From<CreateOrderRequest> for CreateOrder {
    fn from(r: CreateOrderRequest) -> Self {
        CreateOrder {
            customer_id: r.customer_id,
            customer_name: r.customer_name,
            items: r
                .items
                .into_iter()
                .map(|i| OrderItem {
                    name: i.name,
                    quantity: i.quantity,
                    price: i.price,
                })
                .collect(),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub customer_id: Option<u64>,
    pub status: Option<OrderStatus>,
    pub billed: Option<bool>,
}

impl From<ListOrdersQuery> for ListOrdersFilter {
    fn from(q: ListOrdersQuery) -> Self {
        ListOrdersFilter {
            customer_id: q.customer_id,
            status: q.status,
            billed: q.billed,
        }
    }
}

// =============================================================================
// Wallets
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WalletMovementRequest {
    #[validate(custom(function = "within_money_cap"))]
    pub amount: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub reference: Option<String>,
}

impl WalletMovementRequest {
    pub fn details(&self) -> TransactionDetails {
        TransactionDetails {
            payment_method: self.payment_method.clone(),
            reference: self.reference.clone(),
        }
    }
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInventoryRequest {
    pub product_id: u64,
    /// Defaults to the catalog product name.
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub quantity: u32,
}

impl From<CreateInventoryRequest> for CreateInventoryItem {
    fn from(r: CreateInventoryRequest) -> Self {
        CreateInventoryItem {
            product_id: r.product_id,
            name: r.name,
            quantity: r.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateInventoryRequest {
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<u32>,
}

// =============================================================================
// Analytics
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AnalyticsQuery {
    #[validate(range(min = 1, max = 50, message = "top must be between 1 and 50"))]
    pub top: Option<usize>,
}

impl AnalyticsQuery {
    pub fn top(&self) -> usize {
        self.top.unwrap_or(5)
    }
}
