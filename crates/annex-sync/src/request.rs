// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client request bodies and their validation.
//!
//! Every `validate` runs before any store or cache access, so a rejected
//! request never has side effects.

use annex_core::{AnnexError, ChannelKey};
use serde::{Deserialize, Serialize};

fn require(value: &str, field: &str) -> Result<(), AnnexError> {
    if value.trim().is_empty() {
        return Err(AnnexError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_nonzero<T: Default + PartialEq>(value: T, field: &str) -> Result<(), AnnexError> {
    if value == T::default() {
        return Err(AnnexError::Validation(format!("{field} must not be 0")));
    }
    Ok(())
}

/// Incremental conversation pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConversationRequest {
    pub login_uid: String,
    /// Highest conversation version the client already holds.
    pub version: i64,
    /// `channel_id:channel_type:last_msg_seq` entries joined by `|`.
    pub last_msg_seqs: String,
    pub msg_count: i64,
    pub device_uuid: String,
}

impl SyncConversationRequest {
    pub fn validate(&self) -> Result<(), AnnexError> {
        require(&self.login_uid, "login_uid")
    }
}

/// Acknowledges the last conversation pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncAckRequest {
    pub login_uid: String,
    pub cmd_version: i64,
    pub device_uuid: String,
}

impl SyncAckRequest {
    pub fn validate(&self) -> Result<(), AnnexError> {
        require(&self.login_uid, "login_uid")
    }
}

/// Pull of global extras changed on one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraSyncRequest {
    pub login_uid: String,
    pub channel_id: String,
    pub channel_type: u8,
    pub extra_version: i64,
    /// Client identifier that keeps its own extra cursor (e.g. platform).
    pub source: String,
    pub limit: i64,
}

impl ExtraSyncRequest {
    pub fn validate(&self) -> Result<(), AnnexError> {
        require(&self.login_uid, "login_uid")?;
        require(&self.channel_id, "channel_id")
    }

    pub fn channel(&self) -> ChannelKey {
        ChannelKey::new(self.channel_id.clone(), self.channel_type)
    }
}

/// Window pull of one channel's messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSyncRequest {
    pub login_uid: String,
    pub channel_id: String,
    pub channel_type: u8,
    pub start_message_seq: u32,
    pub end_message_seq: u32,
    pub limit: u32,
    pub pull_mode: u8,
}

impl ChannelSyncRequest {
    pub fn validate(&self) -> Result<(), AnnexError> {
        require(&self.login_uid, "login_uid")?;
        require(&self.channel_id, "channel_id")?;
        require_nonzero(self.channel_type, "channel_type")
    }

    pub fn channel(&self) -> ChannelKey {
        ChannelKey::new(self.channel_id.clone(), self.channel_type)
    }
}

/// Revokes a message for every member of its channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevokeRequest {
    pub login_uid: String,
    pub message_id: String,
    pub client_msg_no: String,
    pub channel_id: String,
    pub channel_type: u8,
}

impl RevokeRequest {
    pub fn validate(&self) -> Result<i64, AnnexError> {
        require(&self.login_uid, "login_uid")?;
        require(&self.message_id, "message_id")?;
        require(&self.channel_id, "channel_id")?;
        self.message_id
            .parse::<i64>()
            .map_err(|_| AnnexError::Validation("message_id must be numeric".into()))
    }

    pub fn channel(&self) -> ChannelKey {
        ChannelKey::new(self.channel_id.clone(), self.channel_type)
    }
}

/// Targets one message for a per-user flag (delete-for-me, voice read).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFlagRequest {
    pub login_uid: String,
    pub message_id: String,
    pub channel_id: String,
    pub channel_type: u8,
    pub message_seq: u32,
}

impl MessageFlagRequest {
    pub fn validate(&self) -> Result<(), AnnexError> {
        require(&self.login_uid, "login_uid")?;
        require(&self.message_id, "message_id")?;
        require(&self.channel_id, "channel_id")?;
        require_nonzero(self.channel_type, "channel_type")?;
        require_nonzero(self.message_seq, "message_seq")
    }
}

/// Hides everything up to `message_seq` from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetRequest {
    pub login_uid: String,
    pub channel_id: String,
    pub channel_type: u8,
    pub message_seq: u32,
}

impl OffsetRequest {
    pub fn validate(&self) -> Result<(), AnnexError> {
        require(&self.login_uid, "login_uid")?;
        require(&self.channel_id, "channel_id")?;
        require_nonzero(self.channel_type, "channel_type")
    }
}

/// Clears a conversation's unread counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearUnreadRequest {
    pub login_uid: String,
    pub channel_id: String,
    pub channel_type: u8,
    pub unread: i64,
    pub message_seq: u32,
}

impl ClearUnreadRequest {
    pub fn validate(&self) -> Result<(), AnnexError> {
        require(&self.login_uid, "login_uid")?;
        require(&self.channel_id, "channel_id")?;
        require_nonzero(self.channel_type, "channel_type")
    }
}

/// Adds (or resets) a channel's subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribersRequest {
    pub channel_id: String,
    pub channel_type: u8,
    pub reset: i32,
    pub subscribers: Vec<String>,
}

impl SubscribersRequest {
    pub fn validate(&self) -> Result<(), AnnexError> {
        require(&self.channel_id, "channel_id")?;
        require_nonzero(self.channel_type, "channel_type")?;
        if self.subscribers.is_empty() {
            return Err(AnnexError::Validation(
                "subscribers must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_request_requires_uid() {
        let req = SyncConversationRequest::default();
        assert!(matches!(req.validate(), Err(AnnexError::Validation(_))));
    }

    #[test]
    fn extra_sync_requires_channel() {
        let req = ExtraSyncRequest {
            login_uid: "u1".into(),
            ..Default::default()
        };
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("channel_id"));
    }

    #[test]
    fn revoke_returns_numeric_id() {
        let req = RevokeRequest {
            login_uid: "u1".into(),
            message_id: "100".into(),
            channel_id: "g1".into(),
            channel_type: 2,
            ..Default::default()
        };
        assert_eq!(req.validate().unwrap(), 100);

        let bad = RevokeRequest {
            message_id: "abc".into(),
            ..req
        };
        assert!(matches!(bad.validate(), Err(AnnexError::Validation(_))));
    }

    #[test]
    fn flag_request_rejects_zero_fields() {
        let ok = MessageFlagRequest {
            login_uid: "u1".into(),
            message_id: "100".into(),
            channel_id: "g1".into(),
            channel_type: 2,
            message_seq: 3,
        };
        assert!(ok.validate().is_ok());
        assert!(MessageFlagRequest { channel_type: 0, ..ok.clone() }.validate().is_err());
        assert!(MessageFlagRequest { message_seq: 0, ..ok.clone() }.validate().is_err());
        assert!(MessageFlagRequest { message_id: " ".into(), ..ok }.validate().is_err());
    }

    #[test]
    fn missing_json_fields_default() {
        let req: SyncConversationRequest =
            serde_json::from_str(r#"{"login_uid":"u1"}"#).unwrap();
        assert_eq!(req.version, 0);
        assert_eq!(req.msg_count, 0);
        assert!(req.device_uuid.is_empty());
    }

    #[test]
    fn subscribers_required() {
        let req = SubscribersRequest {
            channel_id: "g1".into(),
            channel_type: 2,
            reset: 0,
            subscribers: vec![],
        };
        assert!(req.validate().is_err());
    }
}
