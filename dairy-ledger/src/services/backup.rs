//! Point-in-time snapshots of every persisted collection.
//!
//! A backup is a directory `backup-<UTC timestamp>` under the backup root
//! holding one `<collection>.json` per collection that existed at the time.

use crate::services::inventory::InventoryService;
use crate::services::ledger::{Ledger, LedgerDocuments};
use crate::services::metrics::record_backup;
use crate::services::store::{
    empty_document, CommitGate, DocumentStore, StoreError, WriteBatch, COLLECTIONS, INVENTORY,
    MONTHLY_BILLS, ORDERS, PAYMENTS, WALLETS,
};
use crate::services::wallet::WalletService;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

const BACKUP_PREFIX: &str = "backup-";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Invalid backup name '{0}'")]
    InvalidName(String),

    #[error("Backup {0} not found")]
    BackupNotFound(String),

    #[error("Backup {name} has a corrupt {collection} snapshot")]
    Corrupt { name: String, collection: String },

    #[error("Backup I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BackupError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        BackupError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<BackupError> for AppError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::InvalidName(_) | BackupError::Corrupt { .. } => {
                AppError::BadRequest(anyhow::Error::new(err))
            }
            BackupError::BackupNotFound(_) => AppError::NotFound(anyhow::Error::new(err)),
            BackupError::Store(e) => e.into(),
            BackupError::Io { .. } => AppError::StorageError(anyhow::Error::new(err)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub collections: Vec<String>,
}

pub struct BackupManager {
    store: Arc<dyn DocumentStore>,
    gate: CommitGate,
    dir: PathBuf,
    retain: usize,
    ledger: Arc<Ledger>,
    wallets: Arc<WalletService>,
    inventory: Arc<InventoryService>,
}

impl BackupManager {
    /// `gate` must be the one shared by `ledger`, `wallets` and `inventory`.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gate: CommitGate,
        dir: impl Into<PathBuf>,
        retain: usize,
        ledger: Arc<Ledger>,
        wallets: Arc<WalletService>,
        inventory: Arc<InventoryService>,
    ) -> Self {
        Self {
            store,
            gate,
            dir: dir.into(),
            retain,
            ledger,
            wallets,
            inventory,
        }
    }

    /// Snapshot every collection and prune old backups. Returns the new
    /// backup's name.
    #[instrument(skip(self))]
    pub async fn create_backup(&self) -> Result<BackupInfo, BackupError> {
        let result = self.write_snapshot().await;
        match &result {
            Ok(info) => {
                record_backup("success");
                info!(backup = %info.name, collections = info.collections.len(), "Backup created");
                if let Err(e) = self.prune().await {
                    warn!(error = %e, "Failed to prune old backups");
                }
            }
            Err(e) => {
                record_backup("failure");
                error!(error = %e, "Backup failed");
            }
        }
        result
    }

    async fn write_snapshot(&self) -> Result<BackupInfo, BackupError> {
        // Read every collection at one point between commits.
        let mut documents = Vec::new();
        {
            let _exclusive = self.gate.exclusive().await;
            for collection in COLLECTIONS {
                if let Some(bytes) = self.store.load(collection).await? {
                    documents.push((collection, bytes));
                }
            }
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BackupError::io(&self.dir, e))?;

        let created_at = Utc::now();
        let base = format!(
            "{}{}",
            BACKUP_PREFIX,
            created_at.format("%Y-%m-%dT%H-%M-%S-%3fZ")
        );
        let (name, path) = self.reserve_dir(&base).await?;

        let mut collections = Vec::new();
        for (collection, bytes) in documents {
            let file = path.join(format!("{}.json", collection));
            tokio::fs::write(&file, bytes)
                .await
                .map_err(|e| BackupError::io(&file, e))?;
            collections.push(collection.to_string());
        }

        Ok(BackupInfo {
            name,
            created_at,
            collections,
        })
    }

    /// Create a fresh directory for `base`, suffixing `-1`, `-2`, ... when two
    /// backups land in the same millisecond.
    async fn reserve_dir(&self, base: &str) -> Result<(String, PathBuf), BackupError> {
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                base.to_string()
            } else {
                format!("{}-{}", base, attempt)
            };
            let path = self.dir.join(&name);
            match tokio::fs::create_dir(&path).await {
                Ok(()) => return Ok((name, path)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(BackupError::io(&path, e)),
            }
        }
    }

    /// Backup directory names, newest first.
    async fn backup_names(&self) -> Result<Vec<String>, BackupError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackupError::io(&self.dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BackupError::io(&self.dir, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && name.starts_with(BACKUP_PREFIX) {
                names.push(name);
            }
        }
        // Timestamps are fixed width, so lexical order is chronological.
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let mut backups = Vec::new();
        for name in self.backup_names().await? {
            let path = self.dir.join(&name);
            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|e| BackupError::io(&path, e))?;
            let created_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            let collections = COLLECTIONS
                .iter()
                .filter(|c| path.join(format!("{}.json", c)).exists())
                .map(|c| c.to_string())
                .collect();

            backups.push(BackupInfo {
                name,
                created_at,
                collections,
            });
        }
        Ok(backups)
    }

    /// Replace the live collections with the contents of backup `name`.
    ///
    /// Every snapshot file is decoded into its typed form before anything is
    /// written; a snapshot that does not decode leaves disk and memory as they
    /// were.
    #[instrument(skip(self))]
    pub async fn restore_backup(&self, name: &str) -> Result<BackupInfo, BackupError> {
        validate_name(name)?;
        let path = self.dir.join(name);
        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| BackupError::io(&path, e))?
        {
            return Err(BackupError::BackupNotFound(name.to_string()));
        }

        let orders = read_snapshot_file(&path, ORDERS).await?;
        let bills = read_snapshot_file(&path, MONTHLY_BILLS).await?;
        let payments = read_snapshot_file(&path, PAYMENTS).await?;
        let wallets = read_snapshot_file(&path, WALLETS).await?;
        let inventory = read_snapshot_file(&path, INVENTORY).await?;

        let ledger_documents = LedgerDocuments {
            orders: decode(name, ORDERS, &orders)?,
            bills: decode(name, MONTHLY_BILLS, &bills)?,
            payments: decode(name, PAYMENTS, &payments)?,
        };
        let wallet_documents = decode(name, WALLETS, &wallets)?;
        let inventory_documents = decode(name, INVENTORY, &inventory)?;

        let mut batch = WriteBatch::new();
        batch.put_raw(ORDERS, orders);
        batch.put_raw(MONTHLY_BILLS, bills);
        batch.put_raw(PAYMENTS, payments);
        batch.put_raw(WALLETS, wallets);
        batch.put_raw(INVENTORY, inventory);
        let collections: Vec<String> = batch.collections().map(str::to_string).collect();

        {
            let _exclusive = self.gate.exclusive().await;
            self.store.commit(batch).await.inspect_err(|e| {
                record_backup("restore_failed");
                error!(backup = %name, error = %e, "Restore commit failed");
            })?;
            self.ledger.install(ledger_documents).await;
            self.wallets.install(wallet_documents).await;
            self.inventory.install(inventory_documents).await;
        }

        record_backup("restored");
        info!(backup = %name, collections = collections.len(), "Backup restored");

        Ok(BackupInfo {
            name: name.to_string(),
            created_at: Utc::now(),
            collections,
        })
    }

    async fn prune(&self) -> Result<(), BackupError> {
        for name in self.backup_names().await?.into_iter().skip(self.retain) {
            let path = self.dir.join(&name);
            tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| BackupError::io(&path, e))?;
            info!(backup = %name, "Old backup removed");
        }
        Ok(())
    }
}

/// Raw snapshot of `collection`. A collection absent from the snapshot did not
/// exist yet and restores as empty.
async fn read_snapshot_file(path: &Path, collection: &str) -> Result<Vec<u8>, BackupError> {
    let file = path.join(format!("{}.json", collection));
    match tokio::fs::read(&file).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(empty_document(collection).to_vec())
        }
        Err(e) => Err(BackupError::io(&file, e)),
    }
}

fn decode<T: DeserializeOwned>(
    name: &str,
    collection: &str,
    bytes: &[u8],
) -> Result<T, BackupError> {
    serde_json::from_slice(bytes).map_err(|e| {
        warn!(backup = %name, collection = %collection, error = %e, "Snapshot does not decode");
        BackupError::Corrupt {
            name: name.to_string(),
            collection: collection.to_string(),
        }
    })
}

fn validate_name(name: &str) -> Result<(), BackupError> {
    let valid = name.starts_with(BACKUP_PREFIX)
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..");
    if valid {
        Ok(())
    } else {
        Err(BackupError::InvalidName(name.to_string()))
    }
}

/// Run `create_backup` every `interval` until `token` is cancelled. The first
/// backup is taken one interval after startup.
pub fn spawn_backup_scheduler(
    manager: Arc<BackupManager>,
    interval: Duration,
    token: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!("Backup scheduler disabled by configuration");
        return None;
    }

    info!(interval_secs = interval.as_secs(), "Starting backup scheduler");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Backup scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // Failures are logged and counted inside create_backup.
                    let _ = manager.create_backup().await;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BillingSettings;
    use crate::models::{CreateOrder, ListOrdersFilter, OrderItem};
    use crate::services::catalog::ProductCatalog;
    use crate::services::store::MemoryStore;
    use crate::services::wallet::TransactionDetails;
    use rust_decimal::Decimal;

    struct Fixture {
        dir: tempfile::TempDir,
        store: Arc<dyn DocumentStore>,
        gate: CommitGate,
        manager: BackupManager,
        ledger: Arc<Ledger>,
        wallets: Arc<WalletService>,
    }

    async fn fixture(retain: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let gate = CommitGate::new();
        let ledger = Arc::new(
            Ledger::open(store.clone(), BillingSettings::default())
                .await
                .unwrap()
                .with_gate(gate.clone()),
        );
        let wallets = Arc::new(
            WalletService::open(store.clone())
                .await
                .unwrap()
                .with_gate(gate.clone()),
        );
        let inventory = Arc::new(
            InventoryService::open(store.clone(), Arc::new(ProductCatalog::default()), 20)
                .await
                .unwrap()
                .with_gate(gate.clone()),
        );
        let manager = BackupManager::new(
            store.clone(),
            gate.clone(),
            dir.path().join("backups"),
            retain,
            ledger.clone(),
            wallets.clone(),
            inventory,
        );
        Fixture {
            dir,
            store,
            gate,
            manager,
            ledger,
            wallets,
        }
    }

    fn order() -> CreateOrder {
        CreateOrder {
            customer_id: 1,
            customer_name: "John Doe".to_string(),
            items: vec![OrderItem {
                name: "Butter".to_string(),
                quantity: 2,
                price: Decimal::new(450, 2),
            }],
            created_at: None,
        }
    }

    #[tokio::test]
    async fn restore_rolls_state_back() {
        let f = fixture(7).await;
        f.ledger.create_order(order()).await.unwrap();
        f.wallets
            .credit("u-1", Decimal::from(10), TransactionDetails::default())
            .await
            .unwrap();

        let backup = f.manager.create_backup().await.unwrap();
        assert!(backup.name.starts_with("backup-"));
        assert!(backup.collections.contains(&"orders".to_string()));
        assert!(backup.collections.contains(&"wallets".to_string()));

        f.ledger.create_order(order()).await.unwrap();
        f.wallets
            .credit("u-1", Decimal::from(5), TransactionDetails::default())
            .await
            .unwrap();

        f.manager.restore_backup(&backup.name).await.unwrap();
        assert_eq!(
            f.ledger.list_orders(&ListOrdersFilter::default()).await.len(),
            1
        );
        assert_eq!(f.wallets.get_wallet("u-1").await.balance, Decimal::from(10));
    }

    #[tokio::test]
    async fn undecodable_snapshot_changes_nothing() {
        let f = fixture(7).await;
        f.ledger.create_order(order()).await.unwrap();
        let live_orders = f.store.load(ORDERS).await.unwrap().unwrap();

        let backup = f.manager.create_backup().await.unwrap();
        // Valid JSON, but not an order.
        let file = f
            .dir
            .path()
            .join("backups")
            .join(&backup.name)
            .join("orders.json");
        tokio::fs::write(&file, br#"[{"id":"oops"}]"#).await.unwrap();

        let err = f.manager.restore_backup(&backup.name).await.unwrap_err();
        assert!(matches!(
            err,
            BackupError::Corrupt { ref collection, .. } if collection == ORDERS
        ));

        assert_eq!(f.store.load(ORDERS).await.unwrap().unwrap(), live_orders);
        assert_eq!(
            f.ledger.list_orders(&ListOrdersFilter::default()).await.len(),
            1
        );
        let reopened = Ledger::open(f.store.clone(), BillingSettings::default()).await;
        assert!(reopened.is_ok());
    }

    #[tokio::test]
    async fn backup_waits_for_in_flight_commits() {
        let f = fixture(7).await;
        f.ledger.create_order(order()).await.unwrap();

        let permit = f.gate.shared().await;
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), f.manager.create_backup()).await;
        assert!(blocked.is_err());
        assert!(f.manager.list_backups().await.unwrap().is_empty());

        drop(permit);
        let backup = f.manager.create_backup().await.unwrap();
        assert!(backup.collections.contains(&ORDERS.to_string()));
    }

    #[tokio::test]
    async fn retention_keeps_newest() {
        let f = fixture(2).await;
        f.ledger.create_order(order()).await.unwrap();

        let mut names = Vec::new();
        for _ in 0..3 {
            names.push(f.manager.create_backup().await.unwrap().name);
        }

        let listed: Vec<String> = f
            .manager
            .list_backups()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(listed.len(), 2);
        assert!(!listed.contains(&names[0]));
        assert!(listed.contains(&names[2]));
    }

    #[tokio::test]
    async fn rejects_bad_names() {
        let f = fixture(7).await;
        for name in ["../etc", "backup-../../x", "snapshot-1", "backup-a/b"] {
            let err = f.manager.restore_backup(name).await.unwrap_err();
            assert!(matches!(err, BackupError::InvalidName(_)), "{name}");
        }
        let err = f
            .manager
            .restore_backup("backup-2000-01-01T00-00-00-000Z")
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::BackupNotFound(_)));
    }

    #[tokio::test]
    async fn scheduler_stops_on_cancel() {
        let f = fixture(7).await;
        let token = CancellationToken::new();

        assert!(
            spawn_backup_scheduler(Arc::new(f.manager), Duration::ZERO, token.clone()).is_none()
        );

        let f = fixture(7).await;
        let handle = spawn_backup_scheduler(
            Arc::new(f.manager),
            Duration::from_secs(3600),
            token.clone(),
        )
        .unwrap();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
