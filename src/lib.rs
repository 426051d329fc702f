//! eventlens -- read API over stored security events.
//!
//! Events arrive already scored by an external detector. This crate stores
//! them in SQLite and serves three read-models over HTTP: the event list,
//! a per-event detail view, and whole-store statistics.

pub mod api;
pub mod config;
pub mod events;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::AppConfig;
use events::{EventService, EventStore};
use storage::SqliteEventStore;
use tracing::{error, info};

/// Open the configured database and wrap it in an event store.
pub fn open_store(config: &AppConfig) -> Result<SqliteEventStore> {
    let db_path = config.storage.db_path.to_string_lossy();
    info!(%db_path, "Initializing database");
    let pool = storage::open_pool(&db_path, config.storage.pool_size)?;
    Ok(SqliteEventStore::new(pool))
}

/// Start the eventlens daemon: storage, optional seed, API server.
pub async fn serve(config: &AppConfig) -> Result<()> {
    // 1. Initialize Storage
    let store = Arc::new(open_store(config)?);

    // 2. Seed before accepting requests
    if config.seed.enabled {
        events::seed::seed_if_empty(store.as_ref()).context("failed to seed sample events")?;
    }
    info!(events = store.count()?, "event store ready");

    // 3. Start API Server
    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;
    let state = api::state::AppState::new(EventService::new(store));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "eventlens listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("eventlens stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = wait_for_signal(tokio::signal::ctrl_c(), "ctrl+c");

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Resolve once `signal` fires. A handler that fails to install never
/// resolves, so it cannot trigger shutdown on its own.
async fn wait_for_signal<F>(signal: F, name: &str)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(err) = signal.await {
        error!(error = %err, signal = name, "unable to install signal handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_signal_handler_never_resolves() {
        let failing = std::future::ready(Err(std::io::Error::other("no signal support")));
        let waited =
            tokio::time::timeout(Duration::from_millis(50), wait_for_signal(failing, "ctrl+c"))
                .await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_delivered_signal_resolves() {
        let delivered = std::future::ready(Ok(()));
        let waited =
            tokio::time::timeout(Duration::from_millis(50), wait_for_signal(delivered, "ctrl+c"))
                .await;
        assert!(waited.is_ok());
    }
}
