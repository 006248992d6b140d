//! Módulo de base de datos
//!
//! Conexión y esquema de PostgreSQL.

pub mod connection;
pub mod schema;

pub use connection::{connect, mask_database_url};
pub use schema::ensure_schema;
