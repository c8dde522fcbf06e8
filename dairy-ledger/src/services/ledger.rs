//! Billing ledger: orders, monthly bills and the payments applied to them.
//!
//! The three collections share one lock and one commit boundary. Every
//! mutation is computed on copies of the affected collections, committed to the
//! [`DocumentStore`] as a single batch, and only then swapped into memory, so a
//! failed write leaves both disk and memory at the previous state.
//!
//! Mutations also hold a shared [`CommitGate`] permit, which backup and restore
//! take exclusively.

use crate::config::BillingSettings;
use crate::models::{
    bill_id, BillOrderLine, BillStatus, CreateOrder, CustomerAnalytics, DuesSummary,
    GenerateBillsOutcome, ListBillsFilter, ListOrdersFilter, ListPaymentsFilter, MonthlyBill,
    Order, OrderStatus, Payment, PaymentSummary, RecordPayment, TopCustomer,
    DEFAULT_PAYMENT_METHOD,
};
use crate::services::metrics::{
    record_bills_generated, record_duplicate_bill, record_error, record_payment,
};
use crate::services::store::{
    load_json, CommitGate, DocumentStore, StoreError, WriteBatch, MONTHLY_BILLS, ORDERS,
    PAYMENTS,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No orders found for {month:02}/{year}")]
    NoOrdersFound { month: u32, year: i32 },

    #[error("Bill {0} already exists")]
    DuplicateBill(String),

    #[error("Bill {0} not found")]
    BillNotFound(String),

    #[error("Bill {0} is already paid")]
    AlreadyPaid(String),

    #[error("Invalid payment amount {0}")]
    InvalidAmount(Decimal),

    #[error("Invalid billing period {month}/{year}")]
    InvalidPeriod { month: u32, year: i32 },

    #[error("Order {0} not found")]
    OrderNotFound(u64),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl LedgerError {
    fn kind(&self) -> &'static str {
        match self {
            LedgerError::NoOrdersFound { .. } => "no_orders_found",
            LedgerError::DuplicateBill(_) => "duplicate_bill",
            LedgerError::BillNotFound(_) => "bill_not_found",
            LedgerError::AlreadyPaid(_) => "already_paid",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InvalidPeriod { .. } => "invalid_period",
            LedgerError::OrderNotFound(_) => "order_not_found",
            LedgerError::InvalidOrder(_) => "invalid_order",
            LedgerError::Persistence(_) => "persistence_failure",
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NoOrdersFound { .. }
            | LedgerError::BillNotFound(_)
            | LedgerError::OrderNotFound(_) => AppError::NotFound(anyhow::Error::new(err)),
            LedgerError::DuplicateBill(_) | LedgerError::AlreadyPaid(_) => {
                AppError::Conflict(anyhow::Error::new(err))
            }
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidPeriod { .. }
            | LedgerError::InvalidOrder(_) => AppError::BadRequest(anyhow::Error::new(err)),
            LedgerError::Persistence(e) => e.into(),
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    orders: Vec<Order>,
    bills: HashMap<String, MonthlyBill>,
    payments: Vec<Payment>,
}

impl LedgerState {
    async fn load(store: &dyn DocumentStore) -> Result<Self, StoreError> {
        Ok(Self::from_documents(LedgerDocuments {
            orders: load_json(store, ORDERS).await?.unwrap_or_default(),
            bills: load_json(store, MONTHLY_BILLS).await?.unwrap_or_default(),
            payments: load_json(store, PAYMENTS).await?.unwrap_or_default(),
        }))
    }

    fn from_documents(documents: LedgerDocuments) -> Self {
        Self {
            orders: documents.orders,
            bills: documents
                .bills
                .into_iter()
                .map(|b| (b.bill_id.clone(), b))
                .collect(),
            payments: documents.payments,
        }
    }
}

/// Decoded `orders`, `monthly_bills` and `payments` collections.
#[derive(Debug, Default)]
pub struct LedgerDocuments {
    pub orders: Vec<Order>,
    pub bills: Vec<MonthlyBill>,
    pub payments: Vec<Payment>,
}

/// Bills as persisted: oldest first, ties broken by id, so files diff cleanly.
fn bills_document(bills: &HashMap<String, MonthlyBill>) -> Vec<&MonthlyBill> {
    let mut list: Vec<&MonthlyBill> = bills.values().collect();
    list.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.bill_id.cmp(&b.bill_id))
    });
    list
}

pub(crate) fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Half-open UTC interval `[start, end)` covering one calendar month.
fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_y, next_m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_y, next_m, 1)?;
    Some((
        start.and_hms_opt(0, 0, 0)?.and_utc(),
        end.and_hms_opt(0, 0, 0)?.and_utc(),
    ))
}

/// Late fee for an unpaid bill: `rate` of the current due amount for every
/// started `period_days` window past the due date.
///
/// The basis is the outstanding amount at query time, not the original total,
/// so a partial payment lowers the fee reported by later queries.
pub fn overdue_fee(
    due_amount: Decimal,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
    rate: Decimal,
    period_days: i64,
) -> Decimal {
    if now <= due_date || period_days <= 0 {
        return Decimal::ZERO;
    }
    let overdue_days = (now - due_date).num_days();
    let periods = (overdue_days + period_days - 1) / period_days;
    due_amount
        .saturating_mul(rate)
        .saturating_mul(Decimal::from(periods))
}

/// `Σ quantity × price`, `None` on overflow.
fn order_subtotal(input: &CreateOrder) -> Option<Decimal> {
    input.items.iter().try_fold(Decimal::ZERO, |acc, item| {
        item.line_total().and_then(|line| acc.checked_add(line))
    })
}

pub struct Ledger {
    store: Arc<dyn DocumentStore>,
    gate: CommitGate,
    settings: BillingSettings,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Load orders, bills and payments from the store.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        settings: BillingSettings,
    ) -> Result<Self, LedgerError> {
        let state = LedgerState::load(store.as_ref()).await?;
        info!(
            orders = state.orders.len(),
            bills = state.bills.len(),
            payments = state.payments.len(),
            "Ledger loaded"
        );
        Ok(Self {
            store,
            gate: CommitGate::new(),
            settings,
            state: Mutex::new(state),
        })
    }

    /// Share `gate` with the other services writing to the same store.
    pub fn with_gate(mut self, gate: CommitGate) -> Self {
        self.gate = gate;
        self
    }

    /// Swap in collections that are already committed to the store. The caller
    /// holds the exclusive gate permit.
    pub async fn install(&self, documents: LedgerDocuments) {
        let fresh = LedgerState::from_documents(documents);
        info!(
            orders = fresh.orders.len(),
            bills = fresh.bills.len(),
            payments = fresh.payments.len(),
            "Ledger state replaced"
        );
        *self.state.lock().await = fresh;
    }

    async fn commit(&self, batch: WriteBatch, operation: &str) -> Result<(), LedgerError> {
        self.store.commit(batch).await.map_err(|e| {
            record_error("persistence_failure", operation);
            tracing::error!(operation = operation, error = %e, "Ledger commit failed");
            LedgerError::from(e)
        })
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Create an order with the next sequential id.
    #[instrument(skip(self, input), fields(customer_id = input.customer_id))]
    pub async fn create_order(&self, input: CreateOrder) -> Result<Order, LedgerError> {
        if input.customer_name.trim().is_empty() {
            return Err(LedgerError::InvalidOrder(
                "customer name is required".to_string(),
            ));
        }
        if input.items.is_empty() {
            return Err(LedgerError::InvalidOrder(
                "order has no items".to_string(),
            ));
        }
        if let Some(item) = input
            .items
            .iter()
            .find(|i| i.quantity == 0 || i.price < Decimal::ZERO)
        {
            return Err(LedgerError::InvalidOrder(format!(
                "item '{}' needs a positive quantity and a non-negative price",
                item.name
            )));
        }

        let (subtotal, tax, total) = order_subtotal(&input)
            .and_then(|subtotal| {
                let tax = round_money(subtotal.checked_mul(self.settings.tax_rate)?);
                Some((subtotal, tax, subtotal.checked_add(tax)?))
            })
            .ok_or_else(|| {
                record_error("invalid_order", "create_order");
                LedgerError::InvalidOrder("order total is out of range".to_string())
            })?;

        let _permit = self.gate.shared().await;
        let mut state = self.state.lock().await;
        let order = Order {
            id: state.orders.iter().map(|o| o.id).max().unwrap_or(0) + 1,
            customer_id: input.customer_id,
            customer_name: input.customer_name,
            items: input.items,
            subtotal,
            tax,
            total,
            status: OrderStatus::Pending,
            created_at: input.created_at.unwrap_or_else(Utc::now),
            bill_id: None,
            billed_at: None,
        };

        let mut orders = state.orders.clone();
        orders.push(order.clone());

        let mut batch = WriteBatch::new();
        batch.put_json(ORDERS, &orders)?;
        self.commit(batch, "create_order").await?;
        state.orders = orders;

        info!(order_id = order.id, total = %order.total, "Order created");
        Ok(order)
    }

    /// Orders matching `filter`, newest first.
    pub async fn list_orders(&self, filter: &ListOrdersFilter) -> Vec<Order> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        orders
    }

    pub async fn get_order(&self, id: u64) -> Result<Order, LedgerError> {
        let state = self.state.lock().await;
        state
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or(LedgerError::OrderNotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        id: u64,
        status: OrderStatus,
    ) -> Result<Order, LedgerError> {
        let _permit = self.gate.shared().await;
        let mut state = self.state.lock().await;
        let index = state
            .orders
            .iter()
            .position(|o| o.id == id)
            .ok_or(LedgerError::OrderNotFound(id))?;

        let mut orders = state.orders.clone();
        orders[index].status = status;
        let updated = orders[index].clone();

        let mut batch = WriteBatch::new();
        batch.put_json(ORDERS, &orders)?;
        self.commit(batch, "update_order_status").await?;
        state.orders = orders;

        info!(order_id = id, status = status.as_str(), "Order status updated");
        Ok(updated)
    }

    // =========================================================================
    // Monthly bills
    // =========================================================================

    pub async fn generate_bills(
        &self,
        month: u32,
        year: i32,
        customer_id: Option<u64>,
    ) -> Result<GenerateBillsOutcome, LedgerError> {
        self.generate_bills_at(month, year, customer_id, Utc::now())
            .await
    }

    /// Bill every customer with orders in `month`/`year`, at most once per
    /// customer and period.
    ///
    /// Customers that already have a bill for the period are reported in
    /// `errors` and skipped; the others are still billed. Consumed orders are
    /// tagged with their bill id in the same commit as the new bills.
    #[instrument(skip(self, now))]
    pub async fn generate_bills_at(
        &self,
        month: u32,
        year: i32,
        customer_id: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<GenerateBillsOutcome, LedgerError> {
        let (start, end) = (MIN_YEAR..=MAX_YEAR)
            .contains(&year)
            .then(|| month_bounds(year, month))
            .flatten()
            .ok_or(LedgerError::InvalidPeriod { month, year })?;

        let _permit = self.gate.shared().await;
        let mut state = self.state.lock().await;

        // Group the whole window, billed orders included, so that a customer
        // billed earlier surfaces as a duplicate instead of disappearing.
        let mut groups: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (index, order) in state.orders.iter().enumerate() {
            let in_window = order.created_at >= start && order.created_at < end;
            let wanted = customer_id.is_none_or(|c| order.customer_id == c);
            if in_window && wanted {
                groups.entry(order.customer_id).or_default().push(index);
            }
        }

        if groups.is_empty() {
            record_error("no_orders_found", "generate_bills");
            return Err(LedgerError::NoOrdersFound { month, year });
        }

        let mut orders = state.orders.clone();
        let mut bills = state.bills.clone();
        let mut outcome = GenerateBillsOutcome::default();

        for (customer, indices) in groups {
            let id = bill_id(year, month, customer);
            if bills.contains_key(&id) {
                warn!(bill_id = %id, customer_id = customer, "Bill already exists, skipping");
                record_duplicate_bill();
                outcome
                    .errors
                    .push(format!("{} for customer {}", LedgerError::DuplicateBill(id), customer));
                continue;
            }

            let mut unbilled: Vec<usize> = indices
                .into_iter()
                .filter(|&i| !orders[i].is_billed())
                .collect();
            if unbilled.is_empty() {
                warn!(bill_id = %id, customer_id = customer, "Orders tagged with a missing bill");
                outcome.errors.push(format!(
                    "Orders for customer {} in {:02}/{} are already billed",
                    customer, month, year
                ));
                continue;
            }
            unbilled.sort_by(|&a, &b| {
                orders[a]
                    .created_at
                    .cmp(&orders[b].created_at)
                    .then(orders[a].id.cmp(&orders[b].id))
            });

            let lines: Vec<BillOrderLine> = unbilled
                .iter()
                .map(|&i| BillOrderLine {
                    order_id: orders[i].id,
                    date: orders[i].created_at,
                    amount: orders[i].total,
                })
                .collect();
            let Some(total_amount) = lines
                .iter()
                .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.amount))
            else {
                warn!(bill_id = %id, customer_id = customer, "Bill total out of range");
                record_error("invalid_order", "generate_bills");
                outcome.errors.push(format!(
                    "Bill total for customer {} in {:02}/{} is out of range",
                    customer, month, year
                ));
                continue;
            };

            let mut bill = MonthlyBill {
                bill_id: id.clone(),
                customer_id: customer,
                customer_name: orders[unbilled[0]].customer_name.clone(),
                month,
                year,
                orders: lines,
                total_amount,
                due_amount: total_amount,
                status: BillStatus::Pending,
                due_date: now + Duration::days(self.settings.grace_days),
                created_at: now,
                paid_at: None,
                payment_history: Vec::new(),
            };
            bill.status = bill.balance_status();
            if bill.status == BillStatus::Paid {
                bill.paid_at = Some(now);
            }

            for &i in &unbilled {
                orders[i].bill_id = Some(id.clone());
                orders[i].billed_at = Some(now);
            }

            info!(
                bill_id = %id,
                customer_id = customer,
                orders = bill.orders.len(),
                total_amount = %bill.total_amount,
                "Monthly bill generated"
            );
            bills.insert(id, bill.clone());
            outcome.bills.push(bill);
        }

        if outcome.bills.is_empty() {
            return Ok(outcome);
        }

        let mut batch = WriteBatch::new();
        batch.put_json(MONTHLY_BILLS, &bills_document(&bills))?;
        batch.put_json(ORDERS, &orders)?;
        self.commit(batch, "generate_bills").await?;
        state.bills = bills;
        state.orders = orders;

        record_bills_generated(outcome.bills.len());
        Ok(outcome)
    }

    pub async fn get_bill(&self, bill_id: &str) -> Result<MonthlyBill, LedgerError> {
        let state = self.state.lock().await;
        state
            .bills
            .get(bill_id)
            .cloned()
            .ok_or_else(|| LedgerError::BillNotFound(bill_id.to_string()))
    }

    pub async fn list_bills(&self, filter: &ListBillsFilter) -> Vec<MonthlyBill> {
        self.list_bills_at(filter, Utc::now()).await
    }

    /// Bills matching `filter`, newest first. `status = overdue` selects on the
    /// label derived from `now`.
    pub async fn list_bills_at(
        &self,
        filter: &ListBillsFilter,
        now: DateTime<Utc>,
    ) -> Vec<MonthlyBill> {
        let state = self.state.lock().await;
        let mut bills: Vec<MonthlyBill> = state
            .bills
            .values()
            .filter(|b| filter.matches(b, now))
            .cloned()
            .collect();
        bills.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.bill_id.cmp(&b.bill_id))
        });
        bills
    }

    // =========================================================================
    // Payments
    // =========================================================================

    pub async fn record_payment(
        &self,
        bill_id: &str,
        input: RecordPayment,
    ) -> Result<(Payment, MonthlyBill), LedgerError> {
        self.record_payment_at(bill_id, input, Utc::now()).await
    }

    /// Apply a payment to one bill.
    ///
    /// A missing or zero amount settles the whole due amount. Amounts above the
    /// due amount are clamped to it; the excess is not kept as credit.
    #[instrument(skip(self, input, now))]
    pub async fn record_payment_at(
        &self,
        bill_id: &str,
        input: RecordPayment,
        now: DateTime<Utc>,
    ) -> Result<(Payment, MonthlyBill), LedgerError> {
        let _permit = self.gate.shared().await;
        let mut state = self.state.lock().await;

        let bill = state
            .bills
            .get(bill_id)
            .ok_or_else(|| LedgerError::BillNotFound(bill_id.to_string()))
            .inspect_err(|e| record_error(e.kind(), "record_payment"))?;

        if bill.status == BillStatus::Paid {
            record_error("already_paid", "record_payment");
            return Err(LedgerError::AlreadyPaid(bill_id.to_string()));
        }

        let requested = match input.amount {
            Some(amount) if amount < Decimal::ZERO => {
                record_error("invalid_amount", "record_payment");
                return Err(LedgerError::InvalidAmount(amount));
            }
            Some(amount) if amount > Decimal::ZERO => amount,
            _ => bill.due_amount,
        };
        let applied = requested.min(bill.due_amount);
        if requested > applied {
            warn!(
                bill_id = %bill_id,
                requested = %requested,
                applied = %applied,
                "Overpayment clamped to due amount"
            );
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            bill_id: bill_id.to_string(),
            customer_id: bill.customer_id,
            amount: applied,
            payment_method: input
                .payment_method
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            paid_at: now,
            notes: input.notes,
        };

        let mut updated = bill.clone();
        updated.payment_history.push(PaymentSummary {
            payment_id: payment.id.clone(),
            amount: payment.amount,
            paid_at: payment.paid_at,
            payment_method: payment.payment_method.clone(),
        });
        updated.due_amount = (updated.due_amount - applied).max(Decimal::ZERO);
        updated.status = updated.balance_status();
        if updated.status == BillStatus::Paid {
            updated.paid_at = Some(now);
        }

        let mut bills = state.bills.clone();
        bills.insert(bill_id.to_string(), updated.clone());
        let mut payments = state.payments.clone();
        payments.push(payment.clone());

        let mut batch = WriteBatch::new();
        batch.put_json(PAYMENTS, &payments)?;
        batch.put_json(MONTHLY_BILLS, &bills_document(&bills))?;
        self.commit(batch, "record_payment").await?;
        state.bills = bills;
        state.payments = payments;

        record_payment(
            &payment.payment_method,
            payment.amount.to_f64().unwrap_or_default(),
        );
        info!(
            bill_id = %bill_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            due_amount = %updated.due_amount,
            status = updated.status.as_str(),
            "Payment recorded"
        );

        Ok((payment, updated))
    }

    /// Payments matching `filter`, newest first.
    pub async fn list_payments(&self, filter: &ListPaymentsFilter) -> Vec<Payment> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state
            .payments
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        payments
    }

    // =========================================================================
    // Dues
    // =========================================================================

    /// Late fee `bill` carries at `now`, rounded to cents.
    pub fn overdue_fee_for(&self, bill: &MonthlyBill, now: DateTime<Utc>) -> Decimal {
        if !bill.is_overdue(now) {
            return Decimal::ZERO;
        }
        round_money(overdue_fee(
            bill.due_amount,
            bill.due_date,
            now,
            self.settings.late_fee_rate,
            self.settings.late_fee_period_days,
        ))
    }

    pub async fn dues_summary(&self, customer_id: Option<u64>) -> DuesSummary {
        self.dues_summary_at(customer_id, Utc::now()).await
    }

    pub async fn dues_summary_at(
        &self,
        customer_id: Option<u64>,
        now: DateTime<Utc>,
    ) -> DuesSummary {
        let state = self.state.lock().await;
        let mut summary = DuesSummary {
            total_bills: 0,
            total_amount: Decimal::ZERO,
            total_due: Decimal::ZERO,
            total_paid: Decimal::ZERO,
            pending_bills: 0,
            partial_bills: 0,
            paid_bills: 0,
            overdue_bills: 0,
            total_overdue_fees: Decimal::ZERO,
        };

        for bill in state
            .bills
            .values()
            .filter(|b| customer_id.is_none_or(|c| b.customer_id == c))
        {
            summary.total_bills += 1;
            summary.total_amount = summary.total_amount.saturating_add(bill.total_amount);
            summary.total_due = summary.total_due.saturating_add(bill.due_amount);
            match bill.status {
                BillStatus::Paid => summary.paid_bills += 1,
                BillStatus::Partial => summary.partial_bills += 1,
                BillStatus::Pending | BillStatus::Overdue => summary.pending_bills += 1,
            }
            if bill.is_overdue(now) {
                summary.overdue_bills += 1;
                summary.total_overdue_fees =
                    summary.total_overdue_fees.saturating_add(overdue_fee(
                        bill.due_amount,
                        bill.due_date,
                        now,
                        self.settings.late_fee_rate,
                        self.settings.late_fee_period_days,
                    ));
            }
        }

        summary.total_paid = summary.total_amount.saturating_sub(summary.total_due);
        summary.total_overdue_fees = round_money(summary.total_overdue_fees);
        summary
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    pub async fn customer_analytics(&self, top: usize) -> CustomerAnalytics {
        self.customer_analytics_at(top, Utc::now()).await
    }

    /// Customer counts and the `top` customers by spend.
    ///
    /// Cancelled orders count towards neither order counts nor revenue. A
    /// customer is new this month when their first order falls in the
    /// calendar month of `now`.
    pub async fn customer_analytics_at(
        &self,
        top: usize,
        now: DateTime<Utc>,
    ) -> CustomerAnalytics {
        let state = self.state.lock().await;

        let mut customers: BTreeMap<u64, TopCustomer> = BTreeMap::new();
        let mut first_order: HashMap<u64, DateTime<Utc>> = HashMap::new();
        for order in state
            .orders
            .iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
        {
            let entry = customers
                .entry(order.customer_id)
                .or_insert_with(|| TopCustomer {
                    customer_id: order.customer_id,
                    customer_name: order.customer_name.clone(),
                    order_count: 0,
                    total_spent: Decimal::ZERO,
                });
            entry.order_count += 1;
            entry.total_spent = entry.total_spent.saturating_add(order.total);

            let first = first_order.entry(order.customer_id).or_insert(order.created_at);
            if order.created_at < *first {
                *first = order.created_at;
            }
        }

        let new_this_month = first_order
            .values()
            .filter(|first| first.year() == now.year() && first.month() == now.month())
            .count();
        let total_revenue = customers
            .values()
            .fold(Decimal::ZERO, |acc, c| acc.saturating_add(c.total_spent));

        let mut ranked: Vec<TopCustomer> = customers.into_values().collect();
        ranked.sort_by(|a, b| {
            b.total_spent
                .cmp(&a.total_spent)
                .then(a.customer_id.cmp(&b.customer_id))
        });

        CustomerAnalytics {
            total_customers: ranked.len(),
            repeat_customers: ranked.iter().filter(|c| c.order_count > 1).count(),
            new_customers_this_month: new_this_month,
            total_revenue,
            top_customers: ranked.into_iter().take(top).collect(),
        }
    }
}
