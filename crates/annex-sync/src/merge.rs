// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync merge engine.
//!
//! Joins raw messages from the IM core with the global and per-viewer
//! metadata layers. Lookups are batched by message-id set: one global extra
//! query and one user extra query per merge, regardless of batch size.

use std::collections::HashMap;
use std::sync::Arc;

use annex_core::clock::now_secs;
use annex_core::im::{RawMessage, RawStreamItem};
use annex_core::{AnnexError, GlobalExtra, StorageAdapter, UserExtra};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};
use strum::Display;
use thiserror::Error;
use tracing::{debug, warn};

use crate::view::{MessageExtraView, MessageView, StreamItemView};

/// Payload type reported when a message body cannot be decoded.
pub const CONTENT_ERROR_TYPE: i64 = 97;

/// Payload type reported in place of an end-to-end encrypted body.
pub const SIGNAL_ERROR_TYPE: i64 = 98;

/// Why a message is hidden from a viewer, in reporting priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum DeletionReason {
    /// The payload restricts visibility to a list that excludes the viewer.
    VisibilityExcluded,
    /// Deleted for everyone in the channel.
    MutuallyDeleted,
    /// Deleted by the viewer for themselves.
    DeletedForViewer,
    /// Past its lifetime.
    Expired,
}

impl DeletionReason {
    /// All reasons, highest priority first.
    pub const ORDERED: [DeletionReason; 4] = [
        DeletionReason::VisibilityExcluded,
        DeletionReason::MutuallyDeleted,
        DeletionReason::DeletedForViewer,
        DeletionReason::Expired,
    ];
}

/// Accumulated deletion state of one message.
///
/// Marking is sticky: once any reason applies the message stays deleted, and
/// the reported reason is the highest-priority one seen, whatever the order
/// reasons were marked in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deletion {
    reason: Option<DeletionReason>,
}

impl Deletion {
    pub fn mark(&mut self, reason: DeletionReason) {
        self.reason = Some(match self.reason {
            Some(current) => current.min(reason),
            None => reason,
        });
    }

    pub fn mark_if(&mut self, applies: bool, reason: DeletionReason) {
        if applies {
            self.mark(reason);
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.reason.is_some()
    }

    pub fn reason(&self) -> Option<DeletionReason> {
        self.reason
    }
}

/// Per-message payload decoding failure. Recovered locally, never fatal.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,

    #[error("payload is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes a payload into a non-empty JSON object.
pub fn decode_payload(bytes: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let map: Map<String, Value> = serde_json::from_slice(bytes)?;
    if map.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(map)
}

/// True when the payload names a non-empty `visibles` list without the viewer.
fn excludes_viewer(payload: &Map<String, Value>, viewer: &str) -> bool {
    match payload.get("visibles").and_then(Value::as_array) {
        Some(visibles) if !visibles.is_empty() => {
            !visibles.iter().any(|v| v.as_str() == Some(viewer))
        }
        _ => false,
    }
}

/// Expiry check against a fixed `now` (unix seconds).
pub fn is_expired(expire: u32, timestamp: i32, now: i64) -> bool {
    expire > 0 && now - i64::from(expire) >= i64::from(timestamp)
}

fn stream_item_view(item: &RawStreamItem) -> StreamItemView {
    let blob = match serde_json::from_slice::<Map<String, Value>>(&item.blob) {
        Ok(map) => Some(map),
        Err(e) => {
            warn!(stream_seq = item.stream_seq, client_msg_no = %item.client_msg_no, error = %e, "stream blob is not a JSON object");
            None
        }
    };
    StreamItemView {
        stream_seq: item.stream_seq,
        client_msg_no: item.client_msg_no.clone(),
        blob,
    }
}

/// Joins raw messages with the overlay stores for one viewer at a time.
#[derive(Clone)]
pub struct MergeEngine {
    storage: Arc<dyn StorageAdapter>,
}

impl MergeEngine {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Merges a batch of messages for `viewer`.
    ///
    /// When `offset` is non-zero, messages with `message_seq <= offset` are
    /// suppressed before any lookup. Store errors fail the whole batch.
    pub async fn merge(
        &self,
        viewer: &str,
        messages: Vec<RawMessage>,
        offset: u32,
    ) -> Result<Vec<MessageView>, AnnexError> {
        let messages: Vec<RawMessage> = messages
            .into_iter()
            .filter(|m| offset == 0 || m.message_seq > offset)
            .collect();
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = messages.iter().map(RawMessage::message_id_str).collect();
        let extras: HashMap<String, GlobalExtra> = self
            .storage
            .get_message_extras(&ids)
            .await?
            .into_iter()
            .map(|e| (e.message_id.clone(), e))
            .collect();
        let user_extras: HashMap<String, UserExtra> = self
            .storage
            .get_user_extras(viewer, &ids)
            .await?
            .into_iter()
            .map(|e| (e.message_id.clone(), e))
            .collect();
        debug!(
            viewer,
            messages = messages.len(),
            extras = extras.len(),
            user_extras = user_extras.len(),
            "merging messages"
        );

        let now = now_secs();
        Ok(messages
            .iter()
            .zip(&ids)
            .map(|(message, id)| {
                merge_one(viewer, message, extras.get(id), user_extras.get(id), now)
            })
            .collect())
    }
}

/// Builds the viewer's view of one message.
pub fn merge_one(
    viewer: &str,
    message: &RawMessage,
    extra: Option<&GlobalExtra>,
    user_extra: Option<&UserExtra>,
    now: i64,
) -> MessageView {
    let mut deletion = Deletion::default();
    let mut signal_payload = String::new();

    let payload = if message.setting.is_signal() {
        signal_payload = STANDARD.encode(&message.payload);
        json!({ "type": SIGNAL_ERROR_TYPE })
    } else {
        match decode_payload(&message.payload) {
            Ok(map) => {
                deletion.mark_if(
                    excludes_viewer(&map, viewer),
                    DeletionReason::VisibilityExcluded,
                );
                Value::Object(map)
            }
            Err(e) => {
                warn!(message_id = message.message_id, error = %e, "undecodable message payload");
                json!({ "type": CONTENT_ERROR_TYPE })
            }
        }
    };

    if let Some(extra) = extra {
        deletion.mark_if(extra.is_deleted, DeletionReason::MutuallyDeleted);
    }
    if let Some(user_extra) = user_extra {
        deletion.mark_if(user_extra.message_is_deleted, DeletionReason::DeletedForViewer);
    }
    deletion.mark_if(
        is_expired(message.expire, message.timestamp, now),
        DeletionReason::Expired,
    );

    let mut view = MessageView {
        header: message.header.clone(),
        setting: message.setting.0,
        message_id: message.message_id,
        message_idstr: message.message_id_str(),
        message_seq: message.message_seq,
        client_msg_no: message.client_msg_no.clone(),
        stream_no: message.stream_no.clone(),
        from_uid: message.from_uid.clone(),
        to_uid: message.to_uid.clone(),
        channel_id: message.channel_id.clone(),
        channel_type: message.channel_type,
        expire: message.expire,
        timestamp: message.timestamp,
        payload,
        signal_payload,
        is_deleted: i32::from(deletion.is_deleted()),
        voice_status: user_extra.map_or(0, |u| i32::from(u.voice_readed)),
        streams: message.streams.iter().map(stream_item_view).collect(),
        ..Default::default()
    };

    if let Some(extra) = extra {
        view.revoke = i32::from(extra.revoke);
        view.revoker = extra.revoker.clone();
        view.readed_count = extra.readed_count;
        view.extra_version = extra.version;
        view.message_extra = Some(MessageExtraView::from(extra));
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_storage;
    use annex_core::MessageSetting;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    const NOW: i64 = 1_700_000_000;

    fn raw(id: i64, seq: u32, payload: &str) -> RawMessage {
        RawMessage {
            message_id: id,
            message_seq: seq,
            client_msg_no: format!("c{id}"),
            from_uid: "u1".into(),
            channel_id: "g1".into(),
            channel_type: 2,
            timestamp: (NOW - 10) as i32,
            payload: payload.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn plain_message_is_visible() {
        let view = merge_one("u2", &raw(1, 1, r#"{"type":1,"content":"hi"}"#), None, None, NOW);
        assert_eq!(view.is_deleted, 0);
        assert_eq!(view.payload["content"], "hi");
        assert_eq!(view.message_idstr, "1");
        assert!(view.message_extra.is_none());
        assert_eq!(view.extra_version, 0);
    }

    #[test]
    fn visibles_excluding_viewer_deletes() {
        let msg = raw(1, 1, r#"{"type":1,"visibles":["u1","u3"]}"#);
        assert_eq!(merge_one("u2", &msg, None, None, NOW).is_deleted, 1);
        assert_eq!(merge_one("u3", &msg, None, None, NOW).is_deleted, 0);
    }

    #[test]
    fn empty_visibles_does_not_delete() {
        let msg = raw(1, 1, r#"{"type":1,"visibles":[]}"#);
        assert_eq!(merge_one("u2", &msg, None, None, NOW).is_deleted, 0);
    }

    #[test]
    fn visible_to_viewer_stays_deleted_when_mutually_deleted() {
        let msg = raw(1, 1, r#"{"type":1,"visibles":["u2"]}"#);
        let extra = GlobalExtra {
            message_id: "1".into(),
            is_deleted: true,
            version: 5,
            ..Default::default()
        };
        let view = merge_one("u2", &msg, Some(&extra), None, NOW);
        assert_eq!(view.is_deleted, 1);
        assert_eq!(view.extra_version, 5);
        assert_eq!(view.message_extra.unwrap().is_mutual_deleted, 1);
    }

    #[test]
    fn signal_payload_is_passed_through_base64() {
        let mut msg = raw(1, 1, "\u{1}\u{2}opaque");
        msg.setting = MessageSetting(MessageSetting::SIGNAL);
        let view = merge_one("u2", &msg, None, None, NOW);
        assert_eq!(view.payload, json!({"type": SIGNAL_ERROR_TYPE}));
        assert_eq!(view.signal_payload, STANDARD.encode(&msg.payload));
    }

    #[test]
    #[traced_test]
    fn undecodable_payload_gets_content_error() {
        for payload in ["not json", "{}", "", "[1,2]"] {
            let view = merge_one("u2", &raw(1, 1, payload), None, None, NOW);
            assert_eq!(view.payload, json!({"type": CONTENT_ERROR_TYPE}), "payload {payload:?}");
            assert!(view.signal_payload.is_empty());
        }
        assert!(logs_contain("undecodable message payload"));
    }

    #[test]
    fn bad_base64_affects_only_its_own_message() {
        let batch: Vec<RawMessage> = serde_json::from_str(
            r#"[
                {"message_id": 1, "message_seq": 1, "payload": "eyJ0eXBlIjoxfQ=="},
                {"message_id": 2, "message_seq": 2, "payload": "%%%not-base64%%%"}
            ]"#,
        )
        .unwrap();
        let views: Vec<MessageView> = batch
            .iter()
            .map(|m| merge_one("u2", m, None, None, NOW))
            .collect();
        assert_eq!(views[0].payload, json!({"type": 1}));
        assert_eq!(views[1].payload, json!({"type": CONTENT_ERROR_TYPE}));
    }

    #[test]
    fn expiry_boundary() {
        assert!(!is_expired(0, 0, NOW));
        assert!(is_expired(10, (NOW - 10) as i32, NOW));
        assert!(!is_expired(11, (NOW - 10) as i32, NOW));
    }

    #[test]
    fn user_extra_sets_voice_and_deletion() {
        let msg = raw(1, 1, r#"{"type":4}"#);
        let user = UserExtra {
            uid: "u2".into(),
            message_id: "1".into(),
            message_is_deleted: true,
            voice_readed: true,
            ..Default::default()
        };
        let view = merge_one("u2", &msg, None, Some(&user), NOW);
        assert_eq!(view.is_deleted, 1);
        assert_eq!(view.voice_status, 1);
    }

    #[test]
    fn stream_blobs_decode_or_null() {
        let mut msg = raw(1, 1, r#"{"type":1}"#);
        msg.streams = vec![
            RawStreamItem {
                stream_seq: 1,
                client_msg_no: "s1".into(),
                blob: br#"{"text":"he"}"#.to_vec(),
            },
            RawStreamItem {
                stream_seq: 2,
                client_msg_no: "s2".into(),
                blob: b"garbage".to_vec(),
            },
        ];
        let view = merge_one("u2", &msg, None, None, NOW);
        assert_eq!(view.streams.len(), 2);
        assert_eq!(view.streams[0].blob.as_ref().unwrap()["text"], "he");
        assert!(view.streams[1].blob.is_none());
    }

    #[test]
    fn deletion_reports_highest_priority_reason() {
        let mut d = Deletion::default();
        d.mark(DeletionReason::Expired);
        d.mark(DeletionReason::MutuallyDeleted);
        d.mark(DeletionReason::DeletedForViewer);
        assert_eq!(d.reason(), Some(DeletionReason::MutuallyDeleted));
    }

    fn any_reason() -> impl Strategy<Value = DeletionReason> {
        prop::sample::select(DeletionReason::ORDERED.to_vec())
    }

    proptest! {
        #[test]
        fn deletion_is_sticky_or(reasons in prop::collection::vec(any_reason(), 0..12)) {
            let mut d = Deletion::default();
            for (i, reason) in reasons.iter().enumerate() {
                d.mark(*reason);
                prop_assert!(d.is_deleted());
                let seen_min = reasons[..=i].iter().min().copied();
                prop_assert_eq!(d.reason(), seen_min);
            }
            prop_assert_eq!(d.is_deleted(), !reasons.is_empty());
        }

        #[test]
        fn marking_order_does_not_matter(
            flags in prop::array::uniform4(any::<bool>()),
            shuffle in Just(DeletionReason::ORDERED.to_vec()).prop_shuffle(),
        ) {
            let applies = |r: DeletionReason| flags[DeletionReason::ORDERED.iter().position(|x| *x == r).unwrap()];
            let mut forward = Deletion::default();
            for r in DeletionReason::ORDERED {
                forward.mark_if(applies(r), r);
            }
            let mut shuffled = Deletion::default();
            for r in shuffle {
                shuffled.mark_if(applies(r), r);
            }
            prop_assert_eq!(forward, shuffled);
            prop_assert_eq!(forward.is_deleted(), flags.iter().any(|f| *f));
        }
    }

    #[tokio::test]
    async fn merge_joins_both_layers_and_applies_offset() {
        let (storage, _dir) = temp_storage().await;
        storage
            .insert_message_extra(&GlobalExtra {
                message_id: "2".into(),
                message_seq: 2,
                channel_id: "g1".into(),
                channel_type: 2,
                revoke: true,
                revoker: "u1".into(),
                version: 9,
                ..Default::default()
            })
            .await
            .unwrap();
        storage
            .upsert_user_extra_deleted(&UserExtra {
                uid: "u2".into(),
                message_id: "3".into(),
                message_seq: 3,
                channel_id: "g1".into(),
                channel_type: 2,
                message_is_deleted: true,
                voice_readed: false,
            })
            .await
            .unwrap();

        let engine = MergeEngine::new(storage.clone());
        let batch = vec![
            raw(1, 1, r#"{"type":1}"#),
            raw(2, 2, r#"{"type":1}"#),
            raw(3, 3, r#"{"type":1}"#),
        ];

        let views = engine.merge("u2", batch.clone(), 1).await.unwrap();
        assert_eq!(views.iter().map(|v| v.message_seq).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(views[0].revoke, 1);
        assert_eq!(views[0].revoker, "u1");
        assert_eq!(views[0].extra_version, 9);
        assert_eq!(views[1].is_deleted, 1);

        let other = engine.merge("u3", batch, 0).await.unwrap();
        assert_eq!(other.len(), 3);
        assert!(other.iter().all(|v| v.is_deleted == 0));
    }

    #[tokio::test]
    async fn merge_of_empty_batch_skips_lookups() {
        let (storage, _dir) = temp_storage().await;
        let engine = MergeEngine::new(storage);
        assert!(engine.merge("u1", Vec::new(), 0).await.unwrap().is_empty());
        let suppressed = engine.merge("u1", vec![raw(1, 1, "{}")], 5).await.unwrap();
        assert!(suppressed.is_empty());
    }
}
