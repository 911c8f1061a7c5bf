// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-viewer response views produced by the sync engine.
//!
//! Zero-valued optional fields are omitted from the JSON output so clients
//! can treat absence and zero the same way.

use annex_core::GlobalExtra;
use annex_core::im::MessageHeader;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

/// A message as seen by one viewer, with both metadata layers applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageView {
    pub header: MessageHeader,
    pub setting: u8,
    pub message_id: i64,
    pub message_idstr: String,
    pub message_seq: u32,
    pub client_msg_no: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stream_no: String,
    pub from_uid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub to_uid: String,
    pub channel_id: String,
    pub channel_type: u8,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub expire: u32,
    pub timestamp: i32,
    /// Decoded payload, or a `{"type": ...}` sentinel when it cannot be shown.
    pub payload: Value,
    /// Base64 of the raw bytes of an end-to-end encrypted payload.
    pub signal_payload: String,
    pub is_deleted: i32,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub voice_status: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<StreamItemView>,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub revoke: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub revoker: String,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub readed_count: i64,
    pub extra_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_extra: Option<MessageExtraView>,
}

/// One decoded chunk of a streamed message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamItemView {
    pub stream_seq: u32,
    pub client_msg_no: String,
    /// JSON object carried by the chunk; `null` when the blob is not one.
    pub blob: Option<Map<String, Value>>,
}

/// Global metadata of one message, as returned by extra sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageExtraView {
    pub message_id: i64,
    pub message_id_str: String,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub revoke: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub revoker: String,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub readed_count: i64,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub is_mutual_deleted: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_edit: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub edited_at: i64,
    pub extra_version: i64,
}

impl From<&GlobalExtra> for MessageExtraView {
    fn from(extra: &GlobalExtra) -> Self {
        let content_edit = extra.content_edit.as_deref().and_then(|text| {
            match serde_json::from_str::<Map<String, Value>>(text) {
                Ok(map) => Some(map),
                Err(e) => {
                    warn!(message_id = %extra.message_id, error = %e, "content edit is not a JSON object");
                    None
                }
            }
        });
        Self {
            message_id: extra.message_id.parse().unwrap_or_default(),
            message_id_str: extra.message_id.clone(),
            revoke: i32::from(extra.revoke),
            revoker: extra.revoker.clone(),
            readed_count: extra.readed_count,
            is_mutual_deleted: i32::from(extra.is_deleted),
            content_edit,
            edited_at: extra.edited_at,
            extra_version: extra.version,
        }
    }
}

/// A conversation with its recent messages merged for the viewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationView {
    pub channel_id: String,
    pub channel_type: u8,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub unread: i64,
    pub timestamp: i64,
    pub last_msg_seq: i64,
    pub last_client_msg_no: String,
    pub offset_msg_seq: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub version: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recents: Vec<MessageView>,
}

/// Response of a conversation sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConversationResponse {
    pub uid: String,
    pub conversations: Vec<ConversationView>,
}

/// Response of a channel message sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMessagesView {
    pub start_message_seq: u32,
    pub end_message_seq: u32,
    pub pull_mode: u8,
    pub more: i32,
    pub messages: Vec<MessageView>,
}
