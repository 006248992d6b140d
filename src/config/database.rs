//! Configuración de base de datos
//!
//! Pool settings for PostgreSQL with SQLx.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::environment::ConfigError;

/// Configuración de la base de datos
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(3600),
        }
    }

    /// `DB_MAX_CONNECTIONS` and `DB_ACQUIRE_TIMEOUT_SECS` override the defaults
    pub fn from_lookup(url: String, lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new(url);

        if let Some(value) = lookup("DB_MAX_CONNECTIONS").filter(|v| !v.trim().is_empty()) {
            config.max_connections = value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    name: "DB_MAX_CONNECTIONS",
                    value,
                })?;
        }

        if let Some(value) = lookup("DB_ACQUIRE_TIMEOUT_SECS").filter(|v| !v.trim().is_empty()) {
            let secs = value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "DB_ACQUIRE_TIMEOUT_SECS",
                value,
            })?;
            config.acquire_timeout = Duration::from_secs(secs);
        }

        config.min_connections = config.min_connections.min(config.max_connections);
        Ok(config)
    }

    /// Crear un nuevo pool de conexiones
    ///
    /// Connections are opened on first use; only an unparseable URL fails here.
    pub fn create_pool(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
            .connect_lazy(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_overrides() {
        let lookup = |name: &str| match name {
            "DB_MAX_CONNECTIONS" => Some("8".to_string()),
            "DB_ACQUIRE_TIMEOUT_SECS" => Some("2".to_string()),
            _ => None,
        };
        let config = DatabaseConfig::from_lookup("postgres://localhost/orders".to_string(), &lookup).unwrap();

        assert_eq!(config.max_connections, 8);
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_zero_connections_is_invalid() {
        let lookup = |name: &str| (name == "DB_MAX_CONNECTIONS").then(|| "0".to_string());
        let result = DatabaseConfig::from_lookup("postgres://localhost/orders".to_string(), &lookup);
        assert!(matches!(result, Err(ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", .. })));
    }
}
