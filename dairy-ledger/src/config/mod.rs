use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageConfig,
    pub backup: BackupConfig,
    pub billing: BillingSettings,
    pub inventory: InventoryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(StorageBackend::Json),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    pub dir: PathBuf,
    /// Seconds between scheduled backups; 0 disables the scheduler.
    pub interval_secs: u64,
    /// Number of most recent backups kept on disk.
    pub retain: usize,
}

/// Billing rules applied by the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingSettings {
    /// Days between bill generation and its due date.
    pub grace_days: i64,
    /// Fraction of the outstanding amount charged per overdue period.
    pub late_fee_rate: Decimal,
    /// Length of one overdue period in days.
    pub late_fee_period_days: i64,
    /// Tax applied to order subtotals.
    pub tax_rate: Decimal,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            grace_days: 15,
            late_fee_rate: Decimal::new(2, 2),
            late_fee_period_days: 30,
            tax_rate: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    pub low_stock_threshold: u32,
}

impl LedgerConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";
        let defaults = BillingSettings::default();

        Ok(LedgerConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("dairy-ledger"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            storage: StorageConfig {
                backend: get_parsed("STORAGE_BACKEND", Some("json"), is_prod)?,
                data_dir: get_env("DATA_DIR", Some("data"), is_prod)?.into(),
            },
            backup: BackupConfig {
                dir: get_env("BACKUP_DIR", Some("backups"), is_prod)?.into(),
                interval_secs: get_parsed("BACKUP_INTERVAL_SECS", Some("86400"), false)?,
                retain: get_parsed("BACKUP_RETAIN", Some("7"), false)?,
            },
            billing: BillingSettings {
                grace_days: get_parsed(
                    "BILL_GRACE_DAYS",
                    Some(&defaults.grace_days.to_string()),
                    false,
                )?,
                late_fee_rate: get_parsed(
                    "LATE_FEE_RATE",
                    Some(&defaults.late_fee_rate.to_string()),
                    false,
                )?,
                late_fee_period_days: get_parsed(
                    "LATE_FEE_PERIOD_DAYS",
                    Some(&defaults.late_fee_period_days.to_string()),
                    false,
                )?,
                tax_rate: get_parsed("ORDER_TAX_RATE", Some("0"), false)?,
            },
            inventory: InventoryConfig {
                low_stock_threshold: get_parsed("LOW_STOCK_THRESHOLD", Some("20"), false)?,
            },
        })
    }
}

fn get_parsed<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, default, is_prod)?;
    raw.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
