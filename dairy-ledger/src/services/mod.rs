//! Services module for dairy-ledger.

pub mod backup;
pub mod catalog;
pub mod inventory;
pub mod ledger;
pub mod metrics;
pub mod store;
pub mod wallet;

pub use backup::{spawn_backup_scheduler, BackupError, BackupInfo, BackupManager};
pub use catalog::{CatalogError, ProductCatalog};
pub use inventory::{InventoryError, InventoryService};
pub use ledger::{Ledger, LedgerError};
pub use metrics::{get_metrics, init_metrics};
pub use store::{
    CommitGate, DocumentStore, JsonFileStore, MemoryStore, StoreError, WriteBatch,
};
pub use wallet::{TransactionDetails, WalletError, WalletService};
