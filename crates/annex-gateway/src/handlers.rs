// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the `/v1` API.
//!
//! Handlers only unwrap the body and delegate; validation and all semantics
//! live in the sync services.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Serialize;

use annex_core::{HealthStatus, PluginAdapter};
use annex_sync::request::{
    ChannelSyncRequest, ClearUnreadRequest, ExtraSyncRequest, MessageFlagRequest, OffsetRequest,
    RevokeRequest, SubscribersRequest, SyncAckRequest, SyncConversationRequest,
};
use annex_sync::view::{ChannelMessagesView, MessageExtraView, SyncConversationResponse};

use crate::error::ApiError;
use crate::server::AppState;

type Body<T> = Result<Json<T>, JsonRejection>;

/// Response body of commands that return nothing.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: u16,
}

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse { status: 200 })
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, `degraded` or `unavailable`.
    pub status: &'static str,
    pub version: &'static str,
    pub components: Vec<ComponentHealth>,
}

/// Health of one backend adapter.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub version: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

async fn check(adapter: &dyn PluginAdapter) -> (HealthStatus, ComponentHealth) {
    let status = adapter
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    let component = ComponentHealth {
        name: adapter.name().to_string(),
        version: adapter.version().to_string(),
        status: status.label(),
        detail: status.detail().map(str::to_string),
    };
    (status, component)
}

/// GET /health
///
/// 503 when any backend is unhealthy, 200 otherwise.
pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (storage, store) = tokio::join!(check(state.storage.as_ref()), check(state.store.as_ref()));
    let statuses = [&storage.0, &store.0];

    let (code, status) = if statuses
        .iter()
        .any(|s| matches!(s, HealthStatus::Unhealthy(_)))
    {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else if statuses.iter().any(|s| matches!(s, HealthStatus::Degraded(_))) {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };
    if code != StatusCode::OK {
        tracing::warn!(storage = storage.0.label(), im = store.0.label(), "health check failed");
    }

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            components: vec![storage.1, store.1],
        }),
    )
}

/// POST /v1/conversation/sync
pub async fn post_conversation_sync(
    State(state): State<AppState>,
    body: Body<SyncConversationRequest>,
) -> Result<Json<SyncConversationResponse>, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.coordinator.sync(&req).await?))
}

/// POST /v1/conversation/syncack
pub async fn post_conversation_ack(
    State(state): State<AppState>,
    body: Body<SyncAckRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = body?;
    state.coordinator.ack(&req).await?;
    Ok(ok())
}

/// PUT /v1/conversation/clearUnread
pub async fn put_clear_unread(
    State(state): State<AppState>,
    body: Body<ClearUnreadRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = body?;
    state.messages.clear_unread(&req).await?;
    Ok(ok())
}

/// POST /v1/message/extra/sync
pub async fn post_extra_sync(
    State(state): State<AppState>,
    body: Body<ExtraSyncRequest>,
) -> Result<Json<Vec<MessageExtraView>>, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.messages.sync_extras(&req).await?))
}

/// POST /v1/message/channel/sync
pub async fn post_channel_sync(
    State(state): State<AppState>,
    body: Body<ChannelSyncRequest>,
) -> Result<Json<ChannelMessagesView>, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.messages.sync_channel(&req).await?))
}

/// POST /v1/message/revoke
pub async fn post_revoke(
    State(state): State<AppState>,
    body: Body<RevokeRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = body?;
    state.messages.revoke(&req).await?;
    Ok(ok())
}

/// DELETE /v1/message
pub async fn delete_message(
    State(state): State<AppState>,
    body: Body<MessageFlagRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = body?;
    state.messages.delete(&req).await?;
    Ok(ok())
}

/// PUT /v1/message/voicereaded
pub async fn put_voice_readed(
    State(state): State<AppState>,
    body: Body<MessageFlagRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = body?;
    state.messages.voice_readed(&req).await?;
    Ok(ok())
}

/// POST /v1/message/offset
pub async fn post_offset(
    State(state): State<AppState>,
    body: Body<OffsetRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = body?;
    state.messages.raise_offset(&req).await?;
    Ok(ok())
}

/// POST /v1/channel/subscribers
pub async fn post_subscribers(
    State(state): State<AppState>,
    body: Body<SubscribersRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = body?;
    state.messages.add_subscribers(&req).await?;
    Ok(ok())
}
