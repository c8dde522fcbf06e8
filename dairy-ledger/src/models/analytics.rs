//! Admin analytics derived from orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCustomer {
    pub customer_id: u64,
    pub customer_name: String,
    pub order_count: usize,
    pub total_spent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAnalytics {
    pub total_customers: usize,
    /// Customers with more than one order.
    pub repeat_customers: usize,
    pub new_customers_this_month: usize,
    pub total_revenue: Decimal,
    /// Highest spend first.
    pub top_customers: Vec<TopCustomer>,
}
