//! Metrics module for dairy-ledger.
//! Provides Prometheus metrics for billing, payments and persistence.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_counter_vec, register_histogram_vec, register_int_counter,
    register_int_counter_vec, CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec,
    TextEncoder,
};
use std::sync::OnceLock;

/// Store commit duration histogram
pub static STORE_COMMIT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "ledger_store_commit_duration_seconds",
            "Duration of document store commits"
        ),
        &["backend"]
    )
    .expect("Failed to register STORE_COMMIT_DURATION")
});

/// Recorder for the HTTP middleware metrics (`metrics` crate facade).
static HTTP_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Monthly bills created
pub static BILLS_GENERATED_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Generation candidates rejected because the bill already existed
pub static DUPLICATE_BILLS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Payments recorded by method
pub static PAYMENTS_RECORDED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Payment amount by method (monetary tracking)
pub static PAYMENT_AMOUNT_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Wallet movements by type
pub static WALLET_TRANSACTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Backups by outcome
pub static BACKUPS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once (tests spawn several apps
/// in one process).
pub fn init_metrics() {
    HTTP_METRICS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    });

    BILLS_GENERATED_TOTAL.get_or_init(|| {
        register_int_counter!(opts!(
            "ledger_bills_generated_total",
            "Total monthly bills generated"
        ))
        .expect("Failed to register BILLS_GENERATED_TOTAL")
    });

    DUPLICATE_BILLS_TOTAL.get_or_init(|| {
        register_int_counter!(opts!(
            "ledger_duplicate_bills_total",
            "Bill generation candidates rejected as duplicates"
        ))
        .expect("Failed to register DUPLICATE_BILLS_TOTAL")
    });

    PAYMENTS_RECORDED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "ledger_payments_recorded_total",
                "Total bill payments by payment method"
            ),
            &["payment_method"]
        )
        .expect("Failed to register PAYMENTS_RECORDED_TOTAL")
    });

    PAYMENT_AMOUNT_TOTAL.get_or_init(|| {
        register_counter_vec!(
            opts!(
                "ledger_payment_amount_total",
                "Total amount applied to bills by payment method"
            ),
            &["payment_method"]
        )
        .expect("Failed to register PAYMENT_AMOUNT_TOTAL")
    });

    WALLET_TRANSACTIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("ledger_wallet_transactions_total", "Wallet movements by type"),
            &["type"]
        )
        .expect("Failed to register WALLET_TRANSACTIONS_TOTAL")
    });

    BACKUPS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("ledger_backups_total", "Backups by outcome"),
            &["status"]
        )
        .expect("Failed to register BACKUPS_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("ledger_errors_total", "Total errors by type for alerting"),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*STORE_COMMIT_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = HTTP_METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    output.push_str(&String::from_utf8_lossy(&buffer));
    output
}

/// Record newly generated bills.
pub fn record_bills_generated(count: usize) {
    if let Some(counter) = BILLS_GENERATED_TOTAL.get() {
        counter.inc_by(count as u64);
    }
}

/// Record a duplicate bill rejection.
pub fn record_duplicate_bill() {
    if let Some(counter) = DUPLICATE_BILLS_TOTAL.get() {
        counter.inc();
    }
}

/// Payment methods reported as their own label value.
const PAYMENT_METHOD_LABELS: [&str; 7] = [
    "cash",
    "upi",
    "card",
    "wallet",
    "bank_transfer",
    "phonepe",
    "google_pay",
];

/// Metric label for a client-supplied payment method; anything outside the
/// known set is `other`.
pub fn payment_method_label(payment_method: &str) -> &'static str {
    let normalized = payment_method
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_");
    PAYMENT_METHOD_LABELS
        .iter()
        .find(|label| **label == normalized)
        .copied()
        .unwrap_or("other")
}

/// Record a payment applied to a bill.
pub fn record_payment(payment_method: &str, amount: f64) {
    let label = payment_method_label(payment_method);
    if let Some(counter) = PAYMENTS_RECORDED_TOTAL.get() {
        counter.with_label_values(&[label]).inc();
    }
    if let Some(counter) = PAYMENT_AMOUNT_TOTAL.get() {
        counter.with_label_values(&[label]).inc_by(amount.abs());
    }
}

/// Record a wallet credit or debit.
pub fn record_wallet_transaction(kind: &str) {
    if let Some(counter) = WALLET_TRANSACTIONS_TOTAL.get() {
        counter.with_label_values(&[kind]).inc();
    }
}

/// Record a backup attempt.
pub fn record_backup(status: &str) {
    if let Some(counter) = BACKUPS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}
