//! kv_front server binary
//!
//! Wires configuration, storage, the optional upstream, the janitor and both
//! transports together, then runs until SIGINT or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kv_front::api::create_router;
use kv_front::config::StorageBackend;
use kv_front::storage::{MemoryStorage, RedbStorage, SharedStorage};
use kv_front::transport::SocketServer;
use kv_front::upstream::HttpUpstream;
use kv_front::{spawn_janitor, AppState, CacheStore, Config, Dispatcher, Mode, NotificationBus, Ttl};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open storage and build the cache store
/// 4. Start the expiry janitor (finite TTL only)
/// 5. Bind the Unix socket and start accepting
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kv_front=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let ttl = Ttl::new(config.cache_ttl);
    info!(
        upstream = config.upstream_url.as_deref().unwrap_or("none"),
        ttl = %ttl,
        backend = ?config.storage_backend,
        port = config.server_port,
        socket = %config.socket_path.display(),
        "configuration loaded"
    );

    let storage = open_storage(&config)?;

    let mode = match &config.upstream_url {
        Some(url) => {
            let upstream = HttpUpstream::new(url.clone(), config.upstream_timeout)
                .context("building upstream client")?;
            Mode::Cache(Arc::new(upstream))
        }
        None => Mode::Authority,
    };
    info!(mode = mode.name(), "cache store initialized");

    let mut store = CacheStore::new(storage, mode, ttl);
    let bus = config.enable_notifications.then(|| Arc::new(NotificationBus::new()));
    if let Some(bus) = &bus {
        store = store.with_notifications(bus.clone());
        info!("change notifications enabled");
    }
    let store = Arc::new(store);
    let dispatcher = Dispatcher::new(store.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let janitor = spawn_janitor(
        store.clone(),
        config.janitor_interval,
        config.janitor_chunk,
        shutdown_rx,
    );

    let socket = SocketServer::bind(&config.socket_path, dispatcher.clone(), bus)
        .with_context(|| format!("binding socket {}", config.socket_path.display()))?;
    let socket_task = tokio::spawn(socket.run());

    let app = create_router(AppState::new(dispatcher));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    socket_task.abort();
    if shutdown_tx.send(true).is_err() {
        warn!("janitor already stopped");
    }
    if let Some(janitor) = janitor {
        if let Err(e) = janitor.await {
            warn!(error = %e, "janitor task ended abnormally");
        }
    }
    if let Err(e) = std::fs::remove_file(&config.socket_path) {
        warn!(error = %e, "failed to remove socket file");
    }

    info!("Server shutdown complete");
    Ok(())
}

fn open_storage(config: &Config) -> anyhow::Result<SharedStorage> {
    match config.storage_backend {
        StorageBackend::Redb => {
            let db = RedbStorage::open(&config.db_path)
                .with_context(|| format!("opening database {}", config.db_path.display()))?;
            info!(path = %config.db_path.display(), "redb storage opened");
            Ok(SharedStorage::new(db))
        }
        StorageBackend::Memory => {
            info!("memory storage selected; data is not persisted");
            Ok(SharedStorage::new(MemoryStorage::new()))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
