// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the IM core.
//!
//! Every call is a JSON `POST` against the configured base URL. Failures are
//! translated into [`AnnexError::Upstream`] and never retried: the caller
//! decides whether to re-drive the request.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use annex_config::model::UpstreamConfig;
use annex_core::AnnexError;
use annex_core::im::{
    ChannelMessageQuery, ClearUnread, ConversationQuery, MessageHeader, RawChannelMessages,
    RawConversation, RevokeNotice, SubscriberChange,
};
use annex_core::types::{CHANNEL_TYPE_PERSON, MessageSetting};

use crate::types::{
    CMD_CONTENT_TYPE, CMD_CONVERSATION_UNREAD_CLEAR, CMD_MESSAGE_REVOKE, CommandContent,
    ConversationSyncRequest, ImErrorBody, MessageSendRequest,
};

/// HTTP client for IM core communication.
#[derive(Debug, Clone)]
pub struct ImClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ImClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, AnnexError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnnexError::Upstream {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks that the IM core answers HTTP at all.
    ///
    /// Any status counts as reachable; only transport failures are errors.
    pub async fn ping(&self) -> Result<StatusCode, AnnexError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| self.transport_error("/", e))?;
        Ok(response.status())
    }

    /// Conversations updated since `query.version`.
    pub async fn sync_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<Vec<RawConversation>, AnnexError> {
        let body = ConversationSyncRequest {
            uid: &query.uid,
            version: query.version,
            last_msg_seqs: &query.last_msg_seqs,
            msg_count: query.msg_count,
            larges: None,
        };
        let conversations: Option<Vec<RawConversation>> =
            self.post_json("/conversation/sync", &body).await?;
        Ok(conversations.unwrap_or_default())
    }

    /// One window of a channel's messages.
    pub async fn sync_channel_messages(
        &self,
        query: &ChannelMessageQuery,
    ) -> Result<RawChannelMessages, AnnexError> {
        self.post_json("/channel/messagesync", query).await
    }

    pub async fn add_subscribers(&self, change: &SubscriberChange) -> Result<(), AnnexError> {
        self.post("/channel/subscriber_add", change).await.map(drop)
    }

    /// Clears the unread counter, then tells the user's other devices.
    pub async fn clear_unread(&self, req: &ClearUnread) -> Result<(), AnnexError> {
        self.post("/conversations/clearUnread", req).await?;
        self.send_command(
            MessageHeader {
                no_persist: 1,
                red_dot: 0,
                sync_once: 1,
            },
            "",
            &req.uid,
            CHANNEL_TYPE_PERSON,
            CMD_CONVERSATION_UNREAD_CLEAR,
            serde_json::json!({
                "channel_id": req.channel_id,
                "channel_type": req.channel_type,
                "unread": req.unread,
            }),
        )
        .await
    }

    /// Sends the revoke command into the channel on behalf of the operator.
    pub async fn send_revoke(&self, notice: &RevokeNotice) -> Result<(), AnnexError> {
        self.send_command(
            MessageHeader {
                no_persist: 0,
                red_dot: 0,
                sync_once: 1,
            },
            &notice.operator,
            &notice.channel_id,
            notice.channel_type,
            CMD_MESSAGE_REVOKE,
            serde_json::json!({
                "message_id": notice.message_id.to_string(),
                "client_msg_no": notice.client_msg_no,
                "channel_id": notice.channel_id,
                "channel_type": notice.channel_type,
            }),
        )
        .await
    }

    async fn send_command(
        &self,
        header: MessageHeader,
        from_uid: &str,
        channel_id: &str,
        channel_type: u8,
        cmd: &str,
        param: serde_json::Value,
    ) -> Result<(), AnnexError> {
        let content = CommandContent {
            content_type: CMD_CONTENT_TYPE,
            cmd: cmd.to_string(),
            param: Some(param),
        };
        let encoded = serde_json::to_vec(&content).map_err(|e| AnnexError::Internal(format!(
            "failed to encode command content: {e}"
        )))?;
        let body = MessageSendRequest {
            header,
            setting: MessageSetting::NO_UPDATE_CONVERSATION,
            from_uid: from_uid.to_string(),
            channel_id: channel_id.to_string(),
            channel_type,
            payload: STANDARD.encode(encoded),
        };
        self.post("/message/send", &body).await?;
        debug!(cmd, channel_id, channel_type, "command sent");
        Ok(())
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, AnnexError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        let text = response.text().await.map_err(|e| self.transport_error(path, e))?;
        serde_json::from_str(&text).map_err(|e| AnnexError::Upstream {
            message: format!("failed to parse IM response from {path}: {e}"),
            source: Some(Box::new(e)),
        })
    }

    async fn post<B>(&self, path: &str, body: &B) -> Result<reqwest::Response, AnnexError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(path, e))?;

        let status = response.status();
        debug!(path, status = %status, "IM response received");
        if status == StatusCode::OK {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(path, status = %status, body = %body, "IM request failed");
        Err(translate_error(status, &body))
    }

    fn transport_error(&self, path: &str, e: reqwest::Error) -> AnnexError {
        if e.is_timeout() {
            return AnnexError::Timeout {
                duration: self.timeout,
            };
        }
        AnnexError::Upstream {
            message: format!("IM request to {path} failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

/// Maps a non-200 IM response onto an upstream error.
///
/// A 400 carrying `{"msg": ...}` surfaces the IM core's own message.
pub fn translate_error(status: StatusCode, body: &str) -> AnnexError {
    if status == StatusCode::BAD_REQUEST
        && let Ok(ImErrorBody { msg: Some(msg) }) = serde_json::from_str::<ImErrorBody>(body)
    {
        return AnnexError::upstream(format!("IM service failed: {msg}"));
    }
    AnnexError::upstream(format!("IM service returned status {}", status.as_u16()))
}
