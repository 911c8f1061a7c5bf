// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the stores, the sync engine, and the gateway.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

/// Channel type of a one-to-one conversation.
pub const CHANNEL_TYPE_PERSON: u8 = 1;

/// Channel type of a group conversation.
pub const CHANNEL_TYPE_GROUP: u8 = 2;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    /// Short lowercase label, e.g. `"degraded"`.
    pub fn label(&self) -> &'static str {
        self.into()
    }

    /// Explanation carried by a non-healthy status.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Healthy => None,
            Self::Degraded(detail) | Self::Unhealthy(detail) => Some(detail),
        }
    }
}

/// A conversation scope, identified by channel id and channel type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub channel_id: String,
    pub channel_type: u8,
}

impl ChannelKey {
    pub fn new(channel_id: impl Into<String>, channel_type: u8) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_type,
        }
    }

    /// Returns true for one-to-one channels.
    pub fn is_person(&self) -> bool {
        self.channel_type == CHANNEL_TYPE_PERSON
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.channel_id, self.channel_type)
    }
}

/// Canonical channel id of a one-to-one conversation.
///
/// Both participants resolve to the same id regardless of argument order: the
/// uid with the larger CRC32 goes first, ties are broken by string order.
pub fn fake_channel_id(uid_a: &str, uid_b: &str) -> String {
    let hash_a = crc32fast::hash(uid_a.as_bytes());
    let hash_b = crc32fast::hash(uid_b.as_bytes());
    if hash_a > hash_b || (hash_a == hash_b && uid_a > uid_b) {
        format!("{uid_a}@{uid_b}")
    } else {
        format!("{uid_b}@{uid_a}")
    }
}

/// Channel under which a viewer's overlay metadata is stored.
///
/// Person channels are addressed by the peer's uid on the wire but stored under
/// the shared fake channel id; every other channel type is stored as-is.
pub fn storage_channel(viewer_uid: &str, channel: &ChannelKey) -> ChannelKey {
    if channel.is_person() {
        ChannelKey::new(
            fake_channel_id(viewer_uid, &channel.channel_id),
            channel.channel_type,
        )
    } else {
        channel.clone()
    }
}

/// Global, viewer-independent metadata for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalExtra {
    pub message_id: String,
    pub message_seq: u32,
    pub channel_id: String,
    pub channel_type: u8,
    pub from_uid: String,
    pub revoke: bool,
    /// Uid of the user who revoked the message.
    pub revoker: String,
    pub clone_no: String,
    /// Aggregate read counter.
    pub readed_count: i64,
    /// Replacement payload (JSON text) after an edit.
    pub content_edit: Option<String>,
    pub content_edit_hash: String,
    /// Edit time, unix seconds.
    pub edited_at: i64,
    /// Channel-wide soft delete (mutual delete).
    pub is_deleted: bool,
    /// Sync cursor; strictly increasing per write.
    pub version: i64,
}

impl GlobalExtra {
    pub fn channel(&self) -> ChannelKey {
        ChannelKey::new(self.channel_id.clone(), self.channel_type)
    }
}

/// Per-(user, message) metadata. Absence of a row means "no override".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserExtra {
    pub uid: String,
    pub message_id: String,
    pub message_seq: u32,
    pub channel_id: String,
    pub channel_type: u8,
    /// Deletion scoped to this user only.
    pub message_is_deleted: bool,
    pub voice_readed: bool,
}

/// Floor sequence below which a user's messages are outside the visible window.
///
/// An empty `uid` applies to every user of the channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOffset {
    pub uid: String,
    pub channel_id: String,
    pub channel_type: u8,
    pub message_seq: u32,
}

/// Bit flags carried in a message's `setting` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageSetting(pub u8);

impl MessageSetting {
    pub const RECEIPT: u8 = 1 << 7;
    pub const NO_UPDATE_CONVERSATION: u8 = 1 << 6;
    pub const SIGNAL: u8 = 1 << 5;
    pub const NO_ENCRYPT: u8 = 1 << 4;
    pub const TOPIC: u8 = 1 << 3;
    pub const STREAM: u8 = 1 << 1;

    /// End-to-end encrypted content; the server must not decode the payload.
    pub fn is_signal(self) -> bool {
        self.0 & Self::SIGNAL != 0
    }

    pub fn is_stream(self) -> bool {
        self.0 & Self::STREAM != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_channel_id_is_order_independent() {
        let a = fake_channel_id("u1", "u2");
        let b = fake_channel_id("u2", "u1");
        assert_eq!(a, b);
        assert!(a == "u1@u2" || a == "u2@u1");
    }

    proptest::proptest! {
        #[test]
        fn fake_channel_id_is_shared_by_both_participants(
            a in "[a-z0-9]{1,12}",
            b in "[a-z0-9]{1,12}",
        ) {
            let id = fake_channel_id(&a, &b);
            proptest::prop_assert_eq!(&id, &fake_channel_id(&b, &a));
            let forward = format!("{a}@{b}");
            let backward = format!("{b}@{a}");
            proptest::prop_assert!(id == forward || id == backward);
        }
    }

    #[test]
    fn fake_channel_id_same_uid() {
        assert_eq!(fake_channel_id("u1", "u1"), "u1@u1");
    }

    #[test]
    fn storage_channel_only_rewrites_person_channels() {
        let group = ChannelKey::new("g1", CHANNEL_TYPE_GROUP);
        assert_eq!(storage_channel("u1", &group), group);

        let person = ChannelKey::new("u2", CHANNEL_TYPE_PERSON);
        let stored = storage_channel("u1", &person);
        assert_eq!(stored.channel_id, fake_channel_id("u1", "u2"));
        assert_eq!(stored.channel_type, CHANNEL_TYPE_PERSON);
    }

    #[test]
    fn channel_key_display() {
        assert_eq!(ChannelKey::new("c1", 2).to_string(), "c1-2");
    }

    #[test]
    fn setting_flags() {
        assert!(MessageSetting(MessageSetting::SIGNAL).is_signal());
        assert!(!MessageSetting(MessageSetting::RECEIPT).is_signal());
        assert!(MessageSetting(MessageSetting::SIGNAL | MessageSetting::STREAM).is_stream());
    }

    #[test]
    fn health_status_labels() {
        assert_eq!(HealthStatus::Healthy.label(), "healthy");
        assert_eq!(HealthStatus::Healthy.detail(), None);
        let down = HealthStatus::Unhealthy("connection refused".into());
        assert_eq!(down.label(), "unhealthy");
        assert_eq!(down.detail(), Some("connection refused"));
        assert_eq!(HealthStatus::Degraded("slow".into()).label(), "degraded");
    }
}
