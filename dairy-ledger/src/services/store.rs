//! Document persistence for the back-office collections.
//!
//! Every collection is one JSON document. Services read whole collections at
//! startup and write them back through [`DocumentStore::commit`], which applies
//! a [`WriteBatch`] as a unit so that related collections (orders and bills,
//! bills and payments) never diverge on disk.

use crate::services::metrics::STORE_COMMIT_DURATION;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use service_core::error::AppError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock as AsyncRwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, instrument, warn};

pub const ORDERS: &str = "orders";
pub const MONTHLY_BILLS: &str = "monthly_bills";
pub const PAYMENTS: &str = "payments";
pub const WALLETS: &str = "wallets";
pub const INVENTORY: &str = "inventory";

/// Every collection the service persists, in backup order.
pub const COLLECTIONS: [&str; 5] = [ORDERS, MONTHLY_BILLS, PAYMENTS, WALLETS, INVENTORY];

/// JSON of a collection with no entries.
pub fn empty_document(collection: &str) -> &'static [u8] {
    if collection == WALLETS {
        b"{}"
    } else {
        b"[]"
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {collection}: {source}")]
    Serialization {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Collection {collection} is corrupt: {source}")]
    Corrupt {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::StorageError(anyhow::Error::new(err))
    }
}

/// Documents to be written together.
#[derive(Debug, Default)]
pub struct WriteBatch {
    documents: Vec<(String, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `value` as the new content of `collection`.
    pub fn put_json<T: Serialize + ?Sized>(
        &mut self,
        collection: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization {
                collection: collection.to_string(),
                source,
            })?;
        self.put_raw(collection, bytes);
        Ok(())
    }

    /// Replace `collection` with already-encoded JSON. A later put for the same
    /// collection wins.
    pub fn put_raw(&mut self, collection: &str, bytes: Vec<u8>) {
        self.documents.retain(|(name, _)| name != collection);
        self.documents.push((collection.to_string(), bytes));
    }

    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn into_documents(self) -> Vec<(String, Vec<u8>)> {
        self.documents
    }
}

/// Key-value storage of whole collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Raw JSON of `collection`, or `None` if it was never written.
    async fn load(&self, collection: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write every document in `batch`, or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

/// Orders service commits against whole-store operations.
///
/// A mutation holds a shared permit from before it reads its in-memory state
/// until the committed copy is swapped in. Backup and restore hold the
/// exclusive permit, so they neither observe nor overwrite a half-applied
/// operation.
#[derive(Debug, Clone, Default)]
pub struct CommitGate {
    lock: Arc<AsyncRwLock<()>>,
}

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().await
    }

    pub async fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().await
    }
}

/// Load and decode a collection.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Option<T>, StoreError> {
    match store.load(collection).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                collection: collection.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// One `<collection>.json` file per collection under a data directory.
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Open the store, creating the data directory if needed.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| StoreError::io(&data_dir, e))?;
        info!(data_dir = %data_dir.display(), "JSON file store opened");
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", collection))
    }

    fn staging_path_for(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json.tmp", collection))
    }

    async fn stage(&self, collection: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.staging_path_for(collection);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.sync_all().await.map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn load(&self, collection: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(collection);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    #[instrument(skip(self, batch), fields(collections = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let timer = STORE_COMMIT_DURATION
            .with_label_values(&["json_file"])
            .start_timer();

        // Stage everything first; only a fully staged batch is renamed into place.
        let mut staged = Vec::new();
        for (collection, bytes) in batch.into_documents() {
            match self.stage(&collection, &bytes).await {
                Ok(path) => staged.push((collection, path)),
                Err(e) => {
                    for (_, path) in &staged {
                        let _ = tokio::fs::remove_file(path).await;
                    }
                    let _ = tokio::fs::remove_file(self.staging_path_for(&collection)).await;
                    warn!(collection = %collection, error = %e, "Aborting commit");
                    return Err(e);
                }
            }
        }

        for (collection, tmp) in staged {
            let target = self.path_for(&collection);
            tokio::fs::rename(&tmp, &target)
                .await
                .map_err(|e| StoreError::io(&target, e))?;
        }

        timer.observe_duration();
        Ok(())
    }
}

/// In-process store, used for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, collection: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(collection).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let timer = STORE_COMMIT_DURATION
            .with_label_values(&["memory"])
            .start_timer();
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for (collection, bytes) in batch.into_documents() {
            documents.insert(collection, bytes);
        }
        timer.observe_duration();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_round_trips_a_batch() {
        let store = MemoryStore::new();
        assert!(store.load(ORDERS).await.unwrap().is_none());

        let mut batch = WriteBatch::new();
        batch.put_json(ORDERS, &json!([{"id": 1}])).unwrap();
        batch.put_json(MONTHLY_BILLS, &json!([])).unwrap();
        store.commit(batch).await.unwrap();

        let orders: serde_json::Value = load_json(&store, ORDERS).await.unwrap().unwrap();
        assert_eq!(orders[0]["id"], 1);
        assert!(store.load(MONTHLY_BILLS).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn later_put_for_same_collection_wins() {
        let mut batch = WriteBatch::new();
        batch.put_json(PAYMENTS, &json!([1])).unwrap();
        batch.put_json(PAYMENTS, &json!([2])).unwrap();
        assert_eq!(batch.len(), 1);

        let store = MemoryStore::new();
        store.commit(batch).await.unwrap();
        let payments: Vec<u32> = load_json(&store, PAYMENTS).await.unwrap().unwrap();
        assert_eq!(payments, vec![2]);
    }

    #[tokio::test]
    async fn json_file_store_writes_one_file_per_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("data")).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.put_json(WALLETS, &json!({"u1": {"balance": "5"}})).unwrap();
        batch.put_json(INVENTORY, &json!([])).unwrap();
        store.commit(batch).await.unwrap();

        assert!(store.data_dir().join("wallets.json").exists());
        assert!(store.data_dir().join("inventory.json").exists());
        assert!(!store.data_dir().join("wallets.json.tmp").exists());

        let wallets: serde_json::Value = load_json(&store, WALLETS).await.unwrap().unwrap();
        assert_eq!(wallets["u1"]["balance"], "5");
    }

    #[tokio::test]
    async fn failed_staging_replaces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.put_json(ORDERS, &json!([{"id": 1}])).unwrap();
        batch.put_json(PAYMENTS, &json!([{"id": "p-1"}])).unwrap();
        store.commit(batch).await.unwrap();

        // A directory where the payments temp file should go makes staging fail.
        tokio::fs::create_dir(store.data_dir().join("payments.json.tmp"))
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch.put_json(ORDERS, &json!([{"id": 1}, {"id": 2}])).unwrap();
        batch.put_json(PAYMENTS, &json!([])).unwrap();
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));

        let orders: serde_json::Value = load_json(&store, ORDERS).await.unwrap().unwrap();
        assert_eq!(orders, json!([{"id": 1}]));
        let payments: serde_json::Value = load_json(&store, PAYMENTS).await.unwrap().unwrap();
        assert_eq!(payments, json!([{"id": "p-1"}]));
        assert!(!store.data_dir().join("orders.json.tmp").exists());
    }

    #[tokio::test]
    async fn exclusive_permit_waits_for_shared_holders() {
        let gate = CommitGate::new();
        let shared = gate.shared().await;

        let waiting = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            gate.exclusive(),
        )
        .await;
        assert!(waiting.is_err());

        drop(shared);
        let _exclusive = gate.exclusive().await;
    }

    #[tokio::test]
    async fn corrupt_document_is_reported() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put_raw(ORDERS, b"not json".to_vec());
        store.commit(batch).await.unwrap();

        let err = load_json::<Vec<serde_json::Value>>(&store, ORDERS)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
