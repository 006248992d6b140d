use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use logistics_sync::config::{EnvironmentConfig, StorageBackend};
use logistics_sync::database;
use logistics_sync::repositories::{AggregateStore, MemoryAggregateStore, OrderRepository};
use logistics_sync::services::{ChangeNotifier, LogNotifier, NotificationDispatcher, TelegramNotifier};
use logistics_sync::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚚 Logistics order sync service");

    let config = EnvironmentConfig::from_env().context("invalid configuration")?;
    if config.api_key.is_none() {
        warn!("⚠️ API_KEY is not set: every sync request will be rejected");
    }

    let store: Arc<dyn AggregateStore> = match (&config.storage_backend, &config.database) {
        (StorageBackend::Postgres, Some(db_config)) => {
            let pool = database::connect(db_config)
                .await
                .context("invalid DATABASE_URL")?;
            let lock_timeout_ms = u64::try_from(config.sync_lock_timeout.as_millis()).unwrap_or(u64::MAX);
            Arc::new(OrderRepository::new(pool, lock_timeout_ms))
        }
        _ => {
            warn!("⚠️ Using the in-memory store: data is lost on restart");
            Arc::new(MemoryAggregateStore::new(config.sync_lock_timeout))
        }
    };

    // Writes fail with a storage error until the schema exists
    if let Err(e) = store.ensure_schema().await {
        error!("❌ Schema setup failed: {}", e);
    }

    let notifier: Arc<dyn ChangeNotifier> = match &config.telegram {
        Some(telegram) => match TelegramNotifier::new(&telegram.api_base, &telegram.token, &telegram.chat_id) {
            Ok(notifier) => Arc::new(notifier),
            Err(e) => {
                warn!("⚠️ Telegram notifier unavailable, logging changes instead: {}", e);
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };
    let (dispatcher, notify_worker) = NotificationDispatcher::spawn(notifier, config.notify_queue_capacity);

    let addr: SocketAddr = config
        .server_url()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server_url()))?;

    info!("🗄️ Storage backend: {}", store.backend_name());
    let app = create_router(AppState::new(store, dispatcher, config));

    info!("🌐 Listening on http://{}", addr);
    info!("   POST /api/sync/order");
    info!("   GET  /api/report?limit=N");
    info!("   GET  /api/report/active");
    info!("   GET  /api/report/orders/:order_number");
    info!("   GET  /api/report/stats");
    info!("   GET  /api/report/tasks/overdue");
    info!("   GET  /health");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // The router (and with it every dispatcher clone) is gone; drain the queue
    match tokio::time::timeout(Duration::from_secs(5), notify_worker).await {
        Ok(Err(e)) => warn!("⚠️ Notification worker ended abnormally: {}", e),
        Err(_) => warn!("⚠️ Pending notifications dropped at shutdown"),
        Ok(Ok(())) => {}
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
