//! Conexión a PostgreSQL
//!
//! Opens the pool described by `DatabaseConfig` and logs where it points
//! without leaking credentials. An unreachable server does not stop startup:
//! the pool reconnects on demand and writes fail with a storage error until
//! the database is back.

use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Crear el pool y verificar la conexión
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        "🔌 Connecting to {} (max_connections={}, acquire_timeout={:?})",
        mask_database_url(&config.url),
        config.max_connections,
        config.acquire_timeout
    );

    let pool = config.create_pool()?;
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => info!("✅ Database connection ready"),
        Err(e) => warn!("⚠️ Database not reachable yet, continuing: {}", e),
    }

    Ok(pool)
}

/// Enmascarar credenciales de la URL para los logs
pub fn mask_database_url(url: &str) -> String {
    let Some(at_pos) = url.rfind('@') else {
        return url.to_string();
    };
    let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
    if scheme_end > at_pos {
        return url.to_string();
    }
    format!("{}***:***@{}", &url[..scheme_end], &url[at_pos + 1..])
}
