// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response bodies of the IM core HTTP API.

use serde::{Deserialize, Serialize};

use annex_core::im::MessageHeader;

/// Content type of command messages.
pub const CMD_CONTENT_TYPE: i32 = 99;

/// Command telling channel members a message was revoked.
pub const CMD_MESSAGE_REVOKE: &str = "messageRevoke";

/// Command telling a user's other devices an unread badge was cleared.
pub const CMD_CONVERSATION_UNREAD_CLEAR: &str = "conversationUnreadClear";

/// Body of `POST /conversation/sync`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSyncRequest<'a> {
    pub uid: &'a str,
    pub version: i64,
    pub last_msg_seqs: &'a str,
    pub msg_count: i64,
    /// Large-group hints; always sent as `null`.
    pub larges: Option<Vec<String>>,
}

/// Body of `POST /message/send`.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSendRequest {
    pub header: MessageHeader,
    pub setting: u8,
    pub from_uid: String,
    pub channel_id: String,
    pub channel_type: u8,
    /// Base64 of the JSON content.
    pub payload: String,
}

/// JSON content of a command message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandContent {
    #[serde(rename = "type")]
    pub content_type: i32,
    pub cmd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<serde_json::Value>,
}

/// Error body the IM core returns alongside a 400.
#[derive(Debug, Clone, Deserialize)]
pub struct ImErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
}
