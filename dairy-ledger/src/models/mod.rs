//! Domain models for dairy-ledger.

mod analytics;
mod bill;
mod inventory;
mod order;
mod payment;
mod product;
mod wallet;

pub use analytics::{CustomerAnalytics, TopCustomer};
pub use bill::{
    bill_id, BillOrderLine, BillStatus, DuesSummary, GenerateBillsOutcome, ListBillsFilter,
    MonthlyBill, PaymentSummary,
};
pub use inventory::{CreateInventoryItem, InventoryItem};
pub use order::{CreateOrder, ListOrdersFilter, Order, OrderItem, OrderStatus};
pub use payment::{ListPaymentsFilter, Payment, RecordPayment, DEFAULT_PAYMENT_METHOD};
pub use product::Product;
pub use wallet::{Wallet, WalletTransaction, WalletTransactionType};
