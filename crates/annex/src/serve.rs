// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `annex serve`: wires storage, cursors, the IM core client and the sync
//! services behind the HTTP gateway, then serves until a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use annex_config::{AnnexConfig, CursorBackend};
use annex_core::{
    AnnexError, MessageStoreAdapter, PluginAdapter, StorageAdapter, VersionCursorCache,
};
use annex_gateway::{AppState, start_server};
use annex_storage::{SqliteCursorCache, SqliteStorage};
use annex_sync::{ConversationCoordinator, MemoryCursorCache, MessageService};
use annex_upstream::ImMessageStore;
use tracing::{info, warn};

/// Runs the server until SIGINT or SIGTERM.
pub async fn run_serve(config: AnnexConfig) -> Result<(), AnnexError> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting annex");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let cursors: Arc<dyn VersionCursorCache> = match config.sync.cursor_backend {
        CursorBackend::Sqlite => Arc::new(SqliteCursorCache::new(storage.database()?.clone())),
        CursorBackend::Memory => Arc::new(MemoryCursorCache::new()),
    };
    info!(backend = ?config.sync.cursor_backend, sharing = config.sync.message_save_across_device, "version cursors ready");

    let store: Arc<dyn MessageStoreAdapter> = Arc::new(ImMessageStore::new(&config.upstream)?);
    info!(api_url = %config.upstream.api_url, adapter = store.name(), "IM core client ready");

    let upstream_timeout = Duration::from_secs(config.upstream.timeout_secs);
    let storage_dyn: Arc<dyn StorageAdapter> = storage.clone();
    let state = AppState {
        coordinator: Arc::new(ConversationCoordinator::new(
            storage_dyn.clone(),
            store.clone(),
            cursors.clone(),
            config.sync.clone(),
            upstream_timeout,
        )),
        messages: Arc::new(MessageService::new(
            storage_dyn.clone(),
            store.clone(),
            cursors,
            config.sync.clone(),
            upstream_timeout,
        )),
        storage: storage_dyn,
        store: store.clone(),
    };

    let served = start_server(&config.server, state, shutdown_signal()).await;

    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "IM core client shutdown failed");
    }
    storage.close().await?;
    served?;
    info!("annex serve shutdown complete");
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
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
        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
        _ = terminate => info!("received SIGTERM, initiating shutdown"),
    }
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("annex={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
