//! Configuration module for backoffice-service.

use crate::services::backoffice::{DEFAULT_SELLER_NAME, DEFAULT_VAT_NUMBER};
use crate::services::WorkflowSettings;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct BackofficeConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageConfig,
    pub zatca: ZatcaConfig,
    pub lock_dsr_on_invoice_ack: bool,
    pub seed_demo_data: bool,
    pub rate_limit: RateLimitConfig,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "STORAGE_BACKEND must be 'memory' or 'postgres', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ZatcaConfig {
    pub seller_name: String,
    pub vat_number: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub attempts: u32,
    pub window_seconds: u64,
}

impl BackofficeConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let backend: StorageBackend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;
        let database = match backend {
            StorageBackend::Memory => None,
            StorageBackend::Postgres => Some(DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "DATABASE_URL is required when STORAGE_BACKEND=postgres"
                    ))
                })?,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parse_var("DATABASE_MIN_CONNECTIONS", 2),
            }),
        };

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "backoffice-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            storage: StorageConfig { backend, database },
            zatca: ZatcaConfig {
                seller_name: env::var("ZATCA_SELLER_NAME")
                    .unwrap_or_else(|_| DEFAULT_SELLER_NAME.to_string()),
                vat_number: env::var("ZATCA_VAT_NUMBER")
                    .unwrap_or_else(|_| DEFAULT_VAT_NUMBER.to_string()),
            },
            lock_dsr_on_invoice_ack: parse_var("LOCK_DSR_ON_INVOICE_ACK", true),
            seed_demo_data: parse_var("SEED_DEMO_DATA", true),
            rate_limit: RateLimitConfig {
                attempts: parse_var("RPC_RATE_LIMIT", 120),
                window_seconds: parse_var("RPC_RATE_WINDOW_SECONDS", 60),
            },
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// In-memory configuration with demo data, used by tests.
    pub fn for_tests() -> Self {
        Self {
            common: core_config::Config {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            service_name: "backoffice-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "warn".to_string(),
            otlp_endpoint: None,
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database: None,
            },
            zatca: ZatcaConfig {
                seller_name: DEFAULT_SELLER_NAME.to_string(),
                vat_number: DEFAULT_VAT_NUMBER.to_string(),
            },
            lock_dsr_on_invoice_ack: true,
            seed_demo_data: true,
            rate_limit: RateLimitConfig {
                attempts: 10_000,
                window_seconds: 60,
            },
            allowed_origins: vec!["*".to_string()],
        }
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            seller_name: self.zatca.seller_name.clone(),
            vat_number: self.zatca.vat_number.clone(),
            lock_dsr_on_invoice_ack: self.lock_dsr_on_invoice_ack,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_names() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("PostgreSQL".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert!("sheets".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_config_uses_memory_store_and_ephemeral_port() {
        let config = BackofficeConfig::for_tests();
        assert_eq!(config.common.port, 0);
        assert!(config.storage.database.is_none());
        assert!(config.workflow_settings().lock_dsr_on_invoice_ack);
    }
}
