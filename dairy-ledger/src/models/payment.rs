//! Payment model.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAYMENT_METHOD: &str = "cash";

/// A payment applied against a monthly bill. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub bill_id: String,
    pub customer_id: u64,
    pub amount: Decimal,
    pub payment_method: String,
    pub paid_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Input for recording a payment.
#[derive(Debug, Clone, Default)]
pub struct RecordPayment {
    /// `None` or zero settles the full due amount.
    pub amount: Option<Decimal>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

/// Filter parameters for listing payments. Month and year refer to `paid_at`.
#[derive(Debug, Clone, Default)]
pub struct ListPaymentsFilter {
    pub customer_id: Option<u64>,
    pub bill_id: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl ListPaymentsFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.customer_id.is_none_or(|c| payment.customer_id == c)
            && self
                .bill_id
                .as_deref()
                .is_none_or(|b| payment.bill_id == b)
            && self.month.is_none_or(|m| payment.paid_at.month() == m)
            && self.year.is_none_or(|y| payment.paid_at.year() == y)
    }
}
