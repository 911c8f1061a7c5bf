// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::future::Future;
use std::sync::Arc;

use annex_config::model::ServerConfig;
use annex_core::{AnnexError, MessageStoreAdapter, StorageAdapter};
use annex_sync::{ConversationCoordinator, MessageService};
use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ConversationCoordinator>,
    pub messages: Arc<MessageService>,
    /// Overlay storage, checked by `/health`.
    pub storage: Arc<dyn StorageAdapter>,
    /// IM core adapter, checked by `/health`.
    pub store: Arc<dyn MessageStoreAdapter>,
}

/// Builds the full router: `/health` plus the `/v1` API.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/conversation/sync", post(handlers::post_conversation_sync))
        .route("/conversation/syncack", post(handlers::post_conversation_ack))
        .route("/conversation/clearUnread", put(handlers::put_clear_unread))
        .route("/message", delete(handlers::delete_message))
        .route("/message/extra/sync", post(handlers::post_extra_sync))
        .route("/message/channel/sync", post(handlers::post_channel_sync))
        .route("/message/revoke", post(handlers::post_revoke))
        .route("/message/voicereaded", put(handlers::put_voice_readed))
        .route("/message/offset", post(handlers::post_offset))
        .route("/channel/subscribers", post(handlers::post_subscribers));

    Router::new()
        .route("/health", get(handlers::get_health))
        .nest("/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds to `host:port` and serves until `shutdown` resolves.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AnnexError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AnnexError::Config(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("annex listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AnnexError::Internal(format!("server error: {e}")))?;

    tracing::info!("annex server stopped");
    Ok(())
}
