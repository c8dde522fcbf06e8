//! Customer wallet model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTransactionType {
    Credit,
    Debit,
}

/// A wallet movement; `balance` is the wallet balance right after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: WalletTransactionType,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: String,
    pub balance: Decimal,
    #[serde(default)]
    pub transactions: Vec<WalletTransaction>,
}

impl Wallet {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            balance: Decimal::ZERO,
            transactions: Vec::new(),
        }
    }
}
