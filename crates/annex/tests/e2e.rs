// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests across storage, the sync services and a mock IM core.
//!
//! Each test creates an isolated TestHarness with temp SQLite. Tests are
//! independent and order-insensitive.

use annex_core::im::{RawConversation, RawMessage};
use annex_core::types::{CHANNEL_TYPE_PERSON, fake_channel_id};
use annex_core::{StorageAdapter, VersionCursorCache};
use annex_sync::MergeEngine;
use annex_sync::request::{
    ExtraSyncRequest, MessageFlagRequest, RevokeRequest, SyncAckRequest, SyncConversationRequest,
};
use annex_test_utils::TestHarness;

fn message(id: i64, seq: u32, channel_id: &str) -> RawMessage {
    RawMessage {
        message_id: id,
        message_seq: seq,
        client_msg_no: format!("cm{id}"),
        from_uid: "u2".into(),
        channel_id: channel_id.into(),
        channel_type: CHANNEL_TYPE_PERSON,
        timestamp: 1_700_000_000,
        payload: br#"{"type":1,"content":"hello"}"#.to_vec(),
        ..Default::default()
    }
}

// ---- Revoke, then extra sync ----

#[tokio::test]
async fn revoke_then_extra_sync_returns_new_row() {
    let harness = TestHarness::new().await.unwrap();
    assert!(harness.storage.get_message_extra("100").await.unwrap().is_none());

    harness
        .messages
        .revoke(&RevokeRequest {
            login_uid: "u1".into(),
            message_id: "100".into(),
            client_msg_no: "cm100".into(),
            channel_id: "c1".into(),
            channel_type: CHANNEL_TYPE_PERSON,
        })
        .await
        .unwrap();

    let row = harness.storage.get_message_extra("100").await.unwrap().unwrap();
    assert!(row.revoke);
    assert_eq!(row.revoker, "u1");
    assert!(row.version > 0);
    assert_eq!(row.channel_id, fake_channel_id("u1", "c1"));

    let views = harness
        .messages
        .sync_extras(&ExtraSyncRequest {
            login_uid: "u1".into(),
            channel_id: "c1".into(),
            channel_type: CHANNEL_TYPE_PERSON,
            extra_version: 0,
            source: "android".into(),
            limit: 0,
        })
        .await
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].message_id_str, "100");
    assert_eq!(views[0].revoke, 1);
    assert_eq!(views[0].extra_version, row.version);

    let calls = harness.store.calls().await;
    assert_eq!(calls.revokes.len(), 1);
    assert_eq!(calls.revokes[0].channel_id, "c1");
}

// ---- Delete for one viewer, then merge ----

#[tokio::test]
async fn delete_is_visible_only_to_its_owner() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .messages
        .delete(&MessageFlagRequest {
            login_uid: "u1".into(),
            message_id: "200".into(),
            channel_id: "c1".into(),
            channel_type: CHANNEL_TYPE_PERSON,
            message_seq: 2,
        })
        .await
        .unwrap();

    let engine = MergeEngine::new(harness.storage.clone());
    let batch = vec![message(200, 2, "c1")];

    let for_u1 = engine.merge("u1", batch.clone(), 0).await.unwrap();
    assert_eq!(for_u1[0].is_deleted, 1);

    let for_u2 = engine.merge("u2", batch, 0).await.unwrap();
    assert_eq!(for_u2[0].is_deleted, 0);
}

// ---- Full conversation round trip ----

#[tokio::test]
async fn conversation_round_trip_carries_overlay() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .messages
        .revoke(&RevokeRequest {
            login_uid: "u2".into(),
            message_id: "300".into(),
            client_msg_no: "cm300".into(),
            channel_id: "u1".into(),
            channel_type: CHANNEL_TYPE_PERSON,
        })
        .await
        .unwrap();

    harness
        .store
        .push_conversations(vec![RawConversation {
            channel_id: "u2".into(),
            channel_type: CHANNEL_TYPE_PERSON,
            last_msg_seq: 3,
            version: 1_000,
            recents: vec![message(300, 3, "u2")],
            ..Default::default()
        }])
        .await;

    let resp = harness
        .coordinator
        .sync(&SyncConversationRequest {
            login_uid: "u1".into(),
            device_uuid: "phone".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let recent = &resp.conversations[0].recents[0];
    assert_eq!(recent.revoke, 1);
    assert_eq!(recent.revoker, "u2");
    assert!(recent.message_extra.is_some());

    harness
        .coordinator
        .ack(&SyncAckRequest {
            login_uid: "u1".into(),
            cmd_version: 0,
            device_uuid: "phone".into(),
        })
        .await
        .unwrap();
    assert_eq!(harness.cursors.user_version("u1").await.unwrap(), 1_000);

    // A new device starts from the acknowledged watermark.
    harness
        .coordinator
        .sync(&SyncConversationRequest {
            login_uid: "u1".into(),
            device_uuid: "laptop".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let calls = harness.store.calls().await;
    assert_eq!(calls.conversation_queries.last().unwrap().version, 1_000);
}

#[tokio::test]
async fn sharing_mode_never_touches_cursors() {
    let harness = TestHarness::builder().with_sharing(true).build().await.unwrap();
    harness
        .store
        .push_conversations(vec![RawConversation {
            channel_id: "u2".into(),
            channel_type: CHANNEL_TYPE_PERSON,
            version: 50,
            recents: vec![message(1, 1, "u2")],
            ..Default::default()
        }])
        .await;

    harness
        .coordinator
        .sync(&SyncConversationRequest {
            login_uid: "u1".into(),
            version: 7,
            device_uuid: "phone".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    harness
        .coordinator
        .ack(&SyncAckRequest {
            login_uid: "u1".into(),
            cmd_version: 0,
            device_uuid: "phone".into(),
        })
        .await
        .unwrap();

    assert_eq!(harness.store.calls().await.conversation_queries[0].version, 7);
    assert_eq!(harness.cursors.user_version("u1").await.unwrap(), 0);
    assert_eq!(harness.cursors.device_version("u1", "phone").await.unwrap(), 0);
}
