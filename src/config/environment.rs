//! Configuración de variables de entorno
//!
//! Process settings read once at startup. Every variable has a default except
//! `API_KEY`, whose absence leaves the sync endpoint closed.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::database::DatabaseConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set when STORAGE_BACKEND=postgres")]
    Missing(&'static str),
}

/// Backend del almacén de pedidos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    pub api_base: String,
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub port: u16,
    pub host: String,
    pub api_key: Option<String>,
    pub cors_origins: Vec<String>,
    pub storage_backend: StorageBackend,
    pub database: Option<DatabaseConfig>,
    pub sync_timeout: Duration,
    pub sync_lock_timeout: Duration,
    pub sync_reject_stale: bool,
    pub reports_require_api_key: bool,
    pub telegram: Option<TelegramConfig>,
    pub notify_queue_capacity: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            api_key: None,
            cors_origins: Vec::new(),
            storage_backend: StorageBackend::Memory,
            database: None,
            sync_timeout: Duration::from_secs(30),
            sync_lock_timeout: Duration::from_millis(5000),
            sync_reject_stale: false,
            reports_require_api_key: false,
            telegram: None,
            notify_queue_capacity: 256,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match lookup(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v.is_empty() => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value: v }),
        },
    }
}

impl EnvironmentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_blank = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let storage_backend = match non_blank("STORAGE_BACKEND") {
            None => StorageBackend::Postgres,
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "STORAGE_BACKEND",
                value,
            })?,
        };

        let database = match storage_backend {
            StorageBackend::Postgres => {
                let url = non_blank("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
                Some(DatabaseConfig::from_lookup(url, &lookup)?)
            }
            StorageBackend::Memory => None,
        };

        let telegram = match (non_blank("TELEGRAM_TOKEN"), non_blank("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                token,
                chat_id,
                api_base: non_blank("TELEGRAM_API_BASE").unwrap_or_else(|| "https://api.telegram.org".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            port: parse_var(&lookup, "PORT", defaults.port)?,
            host: non_blank("HOST").unwrap_or(defaults.host),
            api_key: non_blank("API_KEY"),
            cors_origins: non_blank("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            storage_backend,
            database,
            sync_timeout: Duration::from_secs(parse_var(&lookup, "SYNC_TIMEOUT_SECS", 30u64)?),
            sync_lock_timeout: Duration::from_millis(parse_var(&lookup, "SYNC_LOCK_TIMEOUT_MS", 5000u64)?),
            sync_reject_stale: parse_flag(&lookup, "SYNC_REJECT_STALE")?,
            reports_require_api_key: parse_flag(&lookup, "REPORTS_REQUIRE_API_KEY")?,
            telegram,
            notify_queue_capacity: parse_var(&lookup, "NOTIFY_QUEUE_CAPACITY", defaults.notify_queue_capacity)?,
        })
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
