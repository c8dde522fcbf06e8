//! Prepaid customer wallets.

use crate::models::{Wallet, WalletTransaction, WalletTransactionType};
use crate::services::metrics::{record_error, record_wallet_transaction};
use crate::services::store::{
    load_json, CommitGate, DocumentStore, StoreError, WriteBatch, WALLETS,
};
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Wallet for user {0} not found")]
    WalletNotFound(String),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("Crediting {amount} would overflow the balance of {balance}")]
    BalanceOverflow { balance: Decimal, amount: Decimal },

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::WalletNotFound(_) => AppError::NotFound(anyhow::Error::new(err)),
            WalletError::InsufficientBalance { .. }
            | WalletError::InvalidAmount(_)
            | WalletError::BalanceOverflow { .. } => AppError::BadRequest(anyhow::Error::new(err)),
            WalletError::Persistence(e) => e.into(),
        }
    }
}

/// Optional details attached to a wallet movement.
#[derive(Debug, Clone, Default)]
pub struct TransactionDetails {
    pub payment_method: Option<String>,
    pub reference: Option<String>,
}

pub struct WalletService {
    store: Arc<dyn DocumentStore>,
    gate: CommitGate,
    wallets: Mutex<HashMap<String, Wallet>>,
}

async fn load_wallets(store: &dyn DocumentStore) -> Result<HashMap<String, Wallet>, StoreError> {
    let wallets: BTreeMap<String, Wallet> = load_json(store, WALLETS).await?.unwrap_or_default();
    Ok(wallets.into_iter().collect())
}

impl WalletService {
    pub async fn open(store: Arc<dyn DocumentStore>) -> Result<Self, WalletError> {
        let wallets = load_wallets(store.as_ref()).await?;
        info!(wallets = wallets.len(), "Wallets loaded");
        Ok(Self {
            store,
            gate: CommitGate::new(),
            wallets: Mutex::new(wallets),
        })
    }

    pub fn with_gate(mut self, gate: CommitGate) -> Self {
        self.gate = gate;
        self
    }

    /// Swap in a wallets collection that is already committed to the store.
    pub async fn install(&self, wallets: BTreeMap<String, Wallet>) {
        *self.wallets.lock().await = wallets.into_iter().collect();
    }

    /// Wallet for `user_id`; users without one see an empty wallet.
    pub async fn get_wallet(&self, user_id: &str) -> Wallet {
        let wallets = self.wallets.lock().await;
        wallets
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Wallet::empty(user_id))
    }

    /// Transaction history, newest first.
    pub async fn transactions(&self, user_id: &str) -> Vec<WalletTransaction> {
        let mut history = self.get_wallet(user_id).await.transactions;
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history
    }

    /// Add funds, creating the wallet on first use.
    #[instrument(skip(self, details))]
    pub async fn credit(
        &self,
        user_id: &str,
        amount: Decimal,
        details: TransactionDetails,
    ) -> Result<WalletTransaction, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }

        let _permit = self.gate.shared().await;
        let mut wallets = self.wallets.lock().await;
        let mut wallet = wallets
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Wallet::empty(user_id));

        let balance = wallet
            .balance
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow {
                balance: wallet.balance,
                amount,
            })
            .inspect_err(|_| record_error("balance_overflow", "wallet_credit"))?;
        let transaction = apply(
            &mut wallet,
            WalletTransactionType::Credit,
            amount,
            balance,
            details,
        );
        self.persist(&mut wallets, wallet).await?;

        record_wallet_transaction("credit");
        info!(user_id = %user_id, amount = %amount, balance = %transaction.balance, "Wallet credited");
        Ok(transaction)
    }

    /// Withdraw funds; the balance never goes negative.
    #[instrument(skip(self, details))]
    pub async fn debit(
        &self,
        user_id: &str,
        amount: Decimal,
        details: TransactionDetails,
    ) -> Result<WalletTransaction, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }

        let _permit = self.gate.shared().await;
        let mut wallets = self.wallets.lock().await;
        let mut wallet = wallets
            .get(user_id)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound(user_id.to_string()))?;

        if wallet.balance < amount {
            warn!(user_id = %user_id, balance = %wallet.balance, amount = %amount, "Debit refused");
            record_error("insufficient_balance", "wallet_debit");
            return Err(WalletError::InsufficientBalance {
                available: wallet.balance,
                requested: amount,
            });
        }

        let balance = wallet.balance - amount;
        let transaction = apply(
            &mut wallet,
            WalletTransactionType::Debit,
            amount,
            balance,
            details,
        );
        self.persist(&mut wallets, wallet).await?;

        record_wallet_transaction("debit");
        info!(user_id = %user_id, amount = %amount, balance = %transaction.balance, "Wallet debited");
        Ok(transaction)
    }

    async fn persist(
        &self,
        wallets: &mut HashMap<String, Wallet>,
        wallet: Wallet,
    ) -> Result<(), WalletError> {
        let mut next = wallets.clone();
        next.insert(wallet.user_id.clone(), wallet);

        let ordered: BTreeMap<&String, &Wallet> = next.iter().collect();
        let mut batch = WriteBatch::new();
        batch.put_json(WALLETS, &ordered)?;
        self.store.commit(batch).await.inspect_err(|_| {
            record_error("persistence_failure", "wallet");
        })?;

        *wallets = next;
        Ok(())
    }
}

/// Record a movement that leaves `wallet` at `balance`.
fn apply(
    wallet: &mut Wallet,
    kind: WalletTransactionType,
    amount: Decimal,
    balance: Decimal,
    details: TransactionDetails,
) -> WalletTransaction {
    wallet.balance = balance;
    let transaction = WalletTransaction {
        id: format!("TXN-{}", Uuid::new_v4()),
        kind,
        amount,
        timestamp: Utc::now(),
        payment_method: details.payment_method,
        reference: details.reference,
        balance: wallet.balance,
    };
    wallet.transactions.push(transaction.clone());
    transaction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;

    async fn service() -> WalletService {
        WalletService::open(Arc::new(MemoryStore::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_user_has_empty_wallet() {
        let wallets = service().await;
        let wallet = wallets.get_wallet("u-1").await;
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert!(wallet.transactions.is_empty());
    }

    #[tokio::test]
    async fn credit_then_debit_tracks_running_balance() {
        let wallets = service().await;
        let credit = wallets
            .credit(
                "u-1",
                Decimal::new(10000, 2),
                TransactionDetails {
                    payment_method: Some("upi".to_string()),
                    reference: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(credit.kind, WalletTransactionType::Credit);
        assert_eq!(credit.balance, Decimal::new(10000, 2));

        let debit = wallets
            .debit("u-1", Decimal::new(3550, 2), TransactionDetails::default())
            .await
            .unwrap();
        assert_eq!(debit.balance, Decimal::new(6450, 2));

        let history = wallets.transactions("u-1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(wallets.get_wallet("u-1").await.balance, Decimal::new(6450, 2));
    }

    #[tokio::test]
    async fn debit_errors() {
        let wallets = service().await;
        let err = wallets
            .debit("ghost", Decimal::ONE, TransactionDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::WalletNotFound(_)));

        wallets
            .credit("u-2", Decimal::from(5), TransactionDetails::default())
            .await
            .unwrap();
        let err = wallets
            .debit("u-2", Decimal::from(6), TransactionDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientBalance { .. }));
        assert_eq!(wallets.get_wallet("u-2").await.balance, Decimal::from(5));

        let err = wallets
            .credit("u-2", Decimal::ZERO, TransactionDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn credit_past_decimal_range_is_refused() {
        let wallets = service().await;
        wallets
            .credit("u-4", Decimal::MAX, TransactionDetails::default())
            .await
            .unwrap();

        let err = wallets
            .credit("u-4", Decimal::MAX, TransactionDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::BalanceOverflow { .. }));

        let wallet = wallets.get_wallet("u-4").await;
        assert_eq!(wallet.balance, Decimal::MAX);
        assert_eq!(wallet.transactions.len(), 1);
    }

    #[tokio::test]
    async fn wallets_survive_reopen() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let first = WalletService::open(store.clone()).await.unwrap();
        first
            .credit("u-3", Decimal::from(42), TransactionDetails::default())
            .await
            .unwrap();

        let second = WalletService::open(store).await.unwrap();
        assert_eq!(second.get_wallet("u-3").await.balance, Decimal::from(42));
    }
}
