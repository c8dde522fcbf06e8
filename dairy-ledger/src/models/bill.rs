//! Monthly bill model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Deterministic bill identifier for one customer and calendar month.
///
/// This is the idempotence key of bill generation: a second bill for the same
/// `(year, month, customer_id)` is rejected rather than duplicated.
pub fn bill_id(year: i32, month: u32, customer_id: u64) -> String {
    format!("BILL-{}-{:02}-{}", year, month, customer_id)
}

/// Bill status.
///
/// Only `Pending`, `Partial` and `Paid` are ever stored. `Overdue` is a label
/// derived at query time and never blocks payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Partial => "partial",
            BillStatus::Paid => "paid",
            BillStatus::Overdue => "overdue",
        }
    }
}

/// Snapshot of an order taken when the bill was generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillOrderLine {
    pub order_id: u64,
    pub date: DateTime<Utc>,
    pub amount: Decimal,
}

/// Entry in a bill's payment history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub payment_id: String,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
    pub payment_method: String,
}

/// One customer's aggregated obligation for one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBill {
    pub bill_id: String,
    pub customer_id: u64,
    pub customer_name: String,
    pub month: u32,
    pub year: i32,
    pub orders: Vec<BillOrderLine>,
    pub total_amount: Decimal,
    pub due_amount: Decimal,
    pub status: BillStatus,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_history: Vec<PaymentSummary>,
}

impl MonthlyBill {
    /// Sum of every payment applied so far.
    pub fn paid_amount(&self) -> Decimal {
        self.payment_history.iter().map(|p| p.amount).sum()
    }

    /// Stored status recomputed from the balance.
    pub fn balance_status(&self) -> BillStatus {
        if self.due_amount <= Decimal::ZERO {
            BillStatus::Paid
        } else if self.due_amount < self.total_amount {
            BillStatus::Partial
        } else {
            BillStatus::Pending
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != BillStatus::Paid && self.due_date < now
    }

    /// Status as reported to callers: `Overdue` wins over `Pending`/`Partial`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> BillStatus {
        if self.is_overdue(now) {
            BillStatus::Overdue
        } else {
            self.status
        }
    }
}

/// Filter parameters for listing bills.
#[derive(Debug, Clone, Default)]
pub struct ListBillsFilter {
    pub customer_id: Option<u64>,
    pub status: Option<BillStatus>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl ListBillsFilter {
    pub fn matches(&self, bill: &MonthlyBill, now: DateTime<Utc>) -> bool {
        self.customer_id.is_none_or(|c| bill.customer_id == c)
            && self.month.is_none_or(|m| bill.month == m)
            && self.year.is_none_or(|y| bill.year == y)
            && self.status.is_none_or(|s| match s {
                BillStatus::Overdue => bill.is_overdue(now),
                stored => bill.status == stored,
            })
    }
}

/// Result of a generation request: the bills created plus one message per
/// customer whose bill for the period already existed.
#[derive(Debug, Clone, Default)]
pub struct GenerateBillsOutcome {
    pub bills: Vec<MonthlyBill>,
    pub errors: Vec<String>,
}

/// Aggregate dues over a set of bills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuesSummary {
    pub total_bills: usize,
    pub total_amount: Decimal,
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub pending_bills: usize,
    pub partial_bills: usize,
    pub paid_bills: usize,
    pub overdue_bills: usize,
    pub total_overdue_fees: Decimal,
}
