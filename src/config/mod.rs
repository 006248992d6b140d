//! Configuración del proyecto
//!
//! Variables de entorno y parámetros del pool de PostgreSQL.

pub mod database;
pub mod environment;

pub use database::DatabaseConfig;
pub use environment::{ConfigError, EnvironmentConfig, StorageBackend, TelegramConfig};
