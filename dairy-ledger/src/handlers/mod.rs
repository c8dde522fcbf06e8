//! HTTP handlers for dairy-ledger.

pub mod analytics;
pub mod backups;
pub mod bills;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;
pub mod wallets;
