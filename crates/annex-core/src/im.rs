// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types exchanged with the external IM core.
//!
//! Raw payloads and stream blobs travel as base64 strings; they are decoded
//! into bytes here and interpreted by the merge engine. A field that is not
//! valid base64 decodes to no bytes, so one bad message never fails the
//! batch it arrived in.

use serde::{Deserialize, Serialize};

use crate::types::MessageSetting;

/// Header flags of a raw message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(default)]
    pub no_persist: i32,
    #[serde(default)]
    pub red_dot: i32,
    #[serde(default)]
    pub sync_once: i32,
}

/// A message as returned by the IM core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub header: MessageHeader,
    #[serde(default)]
    pub setting: MessageSetting,
    pub message_id: i64,
    #[serde(default)]
    pub message_seq: u32,
    #[serde(default)]
    pub client_msg_no: String,
    #[serde(default)]
    pub stream_no: String,
    #[serde(default)]
    pub from_uid: String,
    #[serde(default)]
    pub to_uid: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    /// Lifetime in seconds; 0 means the message never expires.
    #[serde(default)]
    pub expire: u32,
    /// Server timestamp, unix seconds.
    #[serde(default)]
    pub timestamp: i32,
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub streams: Vec<RawStreamItem>,
}

impl RawMessage {
    /// Decimal form of the message id, the key used by the overlay stores.
    pub fn message_id_str(&self) -> String {
        self.message_id.to_string()
    }
}

/// One chunk of a streamed message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStreamItem {
    #[serde(default)]
    pub stream_seq: u32,
    #[serde(default)]
    pub client_msg_no: String,
    #[serde(default, with = "base64_bytes")]
    pub blob: Vec<u8>,
}

/// A recently-updated conversation as returned by the IM core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConversation {
    pub channel_id: String,
    pub channel_type: u8,
    #[serde(default)]
    pub unread: i64,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub last_msg_seq: i64,
    #[serde(default)]
    pub last_client_msg_no: String,
    #[serde(default)]
    pub offset_msg_seq: i64,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub recents: Vec<RawMessage>,
}

/// Parameters of an incremental conversation pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationQuery {
    pub uid: String,
    pub version: i64,
    /// `channel_id:channel_type:last_msg_seq` entries joined by `|`.
    pub last_msg_seqs: String,
    /// Per-conversation recent message cap.
    pub msg_count: i64,
}

/// Parameters of a channel message pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessageQuery {
    pub login_uid: String,
    pub channel_id: String,
    pub channel_type: u8,
    #[serde(default)]
    pub start_message_seq: u32,
    #[serde(default)]
    pub end_message_seq: u32,
    #[serde(default)]
    pub limit: u32,
    /// 0 pulls down (older), 1 pulls up (newer).
    #[serde(default)]
    pub pull_mode: u8,
}

/// A page of channel messages as returned by the IM core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChannelMessages {
    #[serde(default)]
    pub start_message_seq: u32,
    #[serde(default)]
    pub end_message_seq: u32,
    #[serde(default)]
    pub pull_mode: u8,
    #[serde(default)]
    pub more: i32,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// Outbound notification that a message was revoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeNotice {
    pub operator: String,
    pub channel_id: String,
    pub channel_type: u8,
    pub message_id: i64,
    pub client_msg_no: String,
}

/// Outbound subscriber add (or reset) for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberChange {
    pub channel_id: String,
    pub channel_type: u8,
    /// 1 replaces the subscriber list, 0 appends.
    pub reset: i32,
    pub subscribers: Vec<String>,
}

/// Outbound request to clear a conversation's unread counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearUnread {
    pub uid: String,
    pub channel_id: String,
    pub channel_type: u8,
    /// 0 clears everything.
    pub unread: i64,
    pub message_seq: u32,
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::warn;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) if !encoded.is_empty() => match STANDARD.decode(encoded.as_bytes()) {
                Ok(bytes) => Ok(bytes),
                Err(e) => {
                    warn!(error = %e, len = encoded.len(), "field is not valid base64, treating as empty");
                    Ok(Vec::new())
                }
            },
            _ => Ok(Vec::new()),
        }
    }
}
