// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message extra service: per-message mutations and channel-scoped pulls.

use std::sync::Arc;
use std::time::Duration;

use annex_config::model::SyncConfig;
use annex_core::im::{ChannelMessageQuery, ClearUnread, RevokeNotice, SubscriberChange};
use annex_core::types::storage_channel;
use annex_core::{
    AnnexError, ChannelOffset, GlobalExtra, MessageStoreAdapter, StorageAdapter, UserExtra,
    VersionClock, VersionCursorCache,
};
use tracing::{debug, info};

use crate::merge::MergeEngine;
use crate::request::{
    ChannelSyncRequest, ClearUnreadRequest, ExtraSyncRequest, MessageFlagRequest, OffsetRequest,
    RevokeRequest, SubscribersRequest,
};
use crate::upstream_call;
use crate::view::{ChannelMessagesView, MessageExtraView};

/// Entry point for every message-level operation other than conversation sync.
pub struct MessageService {
    storage: Arc<dyn StorageAdapter>,
    store: Arc<dyn MessageStoreAdapter>,
    cursors: Arc<dyn VersionCursorCache>,
    merge: MergeEngine,
    clock: VersionClock,
    config: SyncConfig,
    upstream_timeout: Duration,
}

impl MessageService {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        store: Arc<dyn MessageStoreAdapter>,
        cursors: Arc<dyn VersionCursorCache>,
        config: SyncConfig,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            merge: MergeEngine::new(storage.clone()),
            storage,
            store,
            cursors,
            clock: VersionClock::new(),
            config,
            upstream_timeout,
        }
    }

    /// Marks a message revoked and notifies the channel.
    ///
    /// The global extra row is written first; a failed notification is
    /// reported but the revoke stays recorded.
    pub async fn revoke(&self, req: &RevokeRequest) -> Result<(), AnnexError> {
        let message_id = req.validate()?;
        let stored = storage_channel(&req.login_uid, &req.channel());
        let version = self.clock.next();

        match self.storage.get_message_extra(&req.message_id).await? {
            Some(existing) => self.mark_revoked(existing, &req.login_uid, version).await?,
            None => {
                let extra = GlobalExtra {
                    message_id: req.message_id.clone(),
                    channel_id: stored.channel_id,
                    channel_type: stored.channel_type,
                    revoke: true,
                    revoker: req.login_uid.clone(),
                    version,
                    ..Default::default()
                };
                match self.storage.insert_message_extra(&extra).await {
                    Ok(()) => {}
                    // Lost a race with a concurrent writer; apply on top of its row.
                    Err(AnnexError::Conflict { .. }) => {
                        let existing = self
                            .storage
                            .get_message_extra(&req.message_id)
                            .await?
                            .ok_or_else(|| AnnexError::NotFound {
                                entity: "message extra",
                                id: req.message_id.clone(),
                            })?;
                        self.mark_revoked(existing, &req.login_uid, version).await?;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        info!(message_id = %req.message_id, revoker = %req.login_uid, version, "message revoked");

        let notice = RevokeNotice {
            operator: req.login_uid.clone(),
            channel_id: req.channel_id.clone(),
            channel_type: req.channel_type,
            message_id,
            client_msg_no: req.client_msg_no.clone(),
        };
        upstream_call(self.upstream_timeout, self.store.send_revoke(&notice)).await
    }

    async fn mark_revoked(
        &self,
        mut extra: GlobalExtra,
        revoker: &str,
        version: i64,
    ) -> Result<(), AnnexError> {
        extra.revoke = true;
        extra.revoker = revoker.to_string();
        extra.version = version;
        self.storage.update_message_extra(&extra).await
    }

    /// Deletes a message for the caller only.
    pub async fn delete(&self, req: &MessageFlagRequest) -> Result<(), AnnexError> {
        req.validate()?;
        self.storage
            .upsert_user_extra_deleted(&user_extra(req, true, false))
            .await?;
        debug!(uid = %req.login_uid, message_id = %req.message_id, "message deleted for user");
        Ok(())
    }

    /// Marks a voice message as listened to by the caller.
    pub async fn voice_readed(&self, req: &MessageFlagRequest) -> Result<(), AnnexError> {
        req.validate()?;
        self.storage
            .upsert_user_extra_voice_readed(&user_extra(req, false, true))
            .await?;
        debug!(uid = %req.login_uid, message_id = %req.message_id, "voice marked read");
        Ok(())
    }

    /// Raises the caller's offset on a channel, hiding everything up to it.
    pub async fn raise_offset(&self, req: &OffsetRequest) -> Result<(), AnnexError> {
        req.validate()?;
        self.storage
            .raise_channel_offset(&ChannelOffset {
                uid: req.login_uid.clone(),
                channel_id: req.channel_id.clone(),
                channel_type: req.channel_type,
                message_seq: req.message_seq,
            })
            .await
    }

    /// Clamps a client-supplied extra sync page size.
    pub fn extra_sync_limit(&self, requested: i64) -> u32 {
        let max = self.config.extra_sync_max_limit;
        if requested <= 0 {
            self.config.extra_sync_default_limit.min(max)
        } else {
            u32::try_from(requested).map_or(max, |limit| limit.min(max))
        }
    }

    /// Global extras of one channel changed after the caller's version.
    ///
    /// Each (user, source, channel) keeps its own high-water mark: a request
    /// below it is served from the mark, a request above it moves the mark.
    pub async fn sync_extras(
        &self,
        req: &ExtraSyncRequest,
    ) -> Result<Vec<MessageExtraView>, AnnexError> {
        req.validate()?;
        let limit = self.extra_sync_limit(req.limit);
        let channel = req.channel();
        let channel_key = channel.to_string();

        let cached = self
            .cursors
            .extra_version(&req.login_uid, &req.source, &channel_key)
            .await?;
        let version = if cached >= req.extra_version {
            cached
        } else {
            self.cursors
                .set_extra_version(&req.login_uid, &req.source, &channel_key, req.extra_version)
                .await?;
            req.extra_version
        };

        let stored = storage_channel(&req.login_uid, &channel);
        let rows = self
            .storage
            .sync_message_extras(version, &stored, limit)
            .await?;
        debug!(uid = %req.login_uid, channel = %stored, version, limit, rows = rows.len(), "extra sync");
        Ok(rows.iter().map(MessageExtraView::from).collect())
    }

    /// A window of channel messages merged for the caller.
    pub async fn sync_channel(
        &self,
        req: &ChannelSyncRequest,
    ) -> Result<ChannelMessagesView, AnnexError> {
        req.validate()?;
        let query = ChannelMessageQuery {
            login_uid: req.login_uid.clone(),
            channel_id: req.channel_id.clone(),
            channel_type: req.channel_type,
            start_message_seq: req.start_message_seq,
            end_message_seq: req.end_message_seq,
            limit: req.limit,
            pull_mode: req.pull_mode,
        };
        let page = upstream_call(self.upstream_timeout, self.store.fetch_channel_messages(&query))
            .await?;
        let offset = self
            .storage
            .effective_channel_offset(&req.login_uid, &req.channel())
            .await?;
        let messages = self.merge.merge(&req.login_uid, page.messages, offset).await?;
        Ok(ChannelMessagesView {
            start_message_seq: page.start_message_seq,
            end_message_seq: page.end_message_seq,
            pull_mode: page.pull_mode,
            more: page.more,
            messages,
        })
    }

    pub async fn clear_unread(&self, req: &ClearUnreadRequest) -> Result<(), AnnexError> {
        req.validate()?;
        let clear = ClearUnread {
            uid: req.login_uid.clone(),
            channel_id: req.channel_id.clone(),
            channel_type: req.channel_type,
            unread: req.unread,
            message_seq: req.message_seq,
        };
        upstream_call(
            self.upstream_timeout,
            self.store.clear_conversation_unread(&clear),
        )
        .await
    }

    pub async fn add_subscribers(&self, req: &SubscribersRequest) -> Result<(), AnnexError> {
        req.validate()?;
        let change = SubscriberChange {
            channel_id: req.channel_id.clone(),
            channel_type: req.channel_type,
            reset: req.reset,
            subscribers: req.subscribers.clone(),
        };
        upstream_call(self.upstream_timeout, self.store.add_subscribers(&change)).await
    }
}

fn user_extra(req: &MessageFlagRequest, deleted: bool, voice_readed: bool) -> UserExtra {
    UserExtra {
        uid: req.login_uid.clone(),
        message_id: req.message_id.clone(),
        message_seq: req.message_seq,
        channel_id: req.channel_id.clone(),
        channel_type: req.channel_type,
        message_is_deleted: deleted,
        voice_readed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCursorCache;
    use crate::testing::{ScriptedStore, temp_storage};
    use annex_core::ChannelKey;
    use annex_core::im::{RawChannelMessages, RawMessage};
    use annex_core::types::{CHANNEL_TYPE_GROUP, CHANNEL_TYPE_PERSON, fake_channel_id};

    struct Fixture {
        service: MessageService,
        store: Arc<ScriptedStore>,
        storage: Arc<annex_storage::SqliteStorage>,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let (storage, dir) = temp_storage().await;
        let store = Arc::new(ScriptedStore::default());
        let service = MessageService::new(
            storage.clone(),
            store.clone(),
            Arc::new(MemoryCursorCache::new()),
            SyncConfig::default(),
            Duration::from_secs(5),
        );
        Fixture {
            service,
            store,
            storage,
            _dir: dir,
        }
    }

    fn revoke_request(message_id: &str, channel_id: &str, channel_type: u8) -> RevokeRequest {
        RevokeRequest {
            login_uid: "u1".into(),
            message_id: message_id.into(),
            client_msg_no: "c1".into(),
            channel_id: channel_id.into(),
            channel_type,
        }
    }

    fn extra_sync(channel_id: &str, channel_type: u8, version: i64) -> ExtraSyncRequest {
        ExtraSyncRequest {
            login_uid: "u1".into(),
            channel_id: channel_id.into(),
            channel_type,
            extra_version: version,
            source: "ios".into(),
            limit: 0,
        }
    }

    fn flag(uid: &str, message_id: &str, seq: u32) -> MessageFlagRequest {
        MessageFlagRequest {
            login_uid: uid.into(),
            message_id: message_id.into(),
            channel_id: "g1".into(),
            channel_type: CHANNEL_TYPE_GROUP,
            message_seq: seq,
        }
    }

    #[tokio::test]
    async fn revoke_inserts_then_updates_with_rising_version() {
        let f = fixture().await;
        f.service
            .revoke(&revoke_request("100", "g1", CHANNEL_TYPE_GROUP))
            .await
            .unwrap();
        let first = f.storage.get_message_extra("100").await.unwrap().unwrap();
        assert!(first.revoke);
        assert_eq!(first.revoker, "u1");
        assert_eq!(first.channel_id, "g1");

        f.service
            .revoke(&revoke_request("100", "g1", CHANNEL_TYPE_GROUP))
            .await
            .unwrap();
        let second = f.storage.get_message_extra("100").await.unwrap().unwrap();
        assert!(second.version > first.version);

        let notices = f.store.revokes.lock().unwrap();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message_id, 100);
        assert_eq!(notices[0].operator, "u1");
        assert_eq!(notices[0].client_msg_no, "c1");
    }

    #[tokio::test]
    async fn person_revoke_is_stored_under_fake_channel() {
        let f = fixture().await;
        f.service
            .revoke(&revoke_request("100", "u2", CHANNEL_TYPE_PERSON))
            .await
            .unwrap();
        let row = f.storage.get_message_extra("100").await.unwrap().unwrap();
        assert_eq!(row.channel_id, fake_channel_id("u1", "u2"));
        // The notice addresses the channel as the client named it.
        assert_eq!(f.store.revokes.lock().unwrap()[0].channel_id, "u2");
    }

    #[tokio::test]
    async fn revoke_then_extra_sync_returns_row() {
        let f = fixture().await;
        f.service
            .revoke(&revoke_request("100", "g1", CHANNEL_TYPE_GROUP))
            .await
            .unwrap();
        let views = f
            .service
            .sync_extras(&extra_sync("g1", CHANNEL_TYPE_GROUP, 0))
            .await
            .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].message_id, 100);
        assert_eq!(views[0].revoke, 1);
        assert_eq!(views[0].revoker, "u1");

        let since = f
            .service
            .sync_extras(&extra_sync("g1", CHANNEL_TYPE_GROUP, views[0].extra_version))
            .await
            .unwrap();
        assert!(since.is_empty());
    }

    #[tokio::test]
    async fn person_extra_sync_sees_peer_revoke() {
        let f = fixture().await;
        f.service
            .revoke(&revoke_request("100", "u2", CHANNEL_TYPE_PERSON))
            .await
            .unwrap();
        let mut req = extra_sync("u1", CHANNEL_TYPE_PERSON, 0);
        req.login_uid = "u2".into();
        let views = f.service.sync_extras(&req).await.unwrap();
        assert_eq!(views.len(), 1);
    }

    #[tokio::test]
    async fn extra_sync_uses_cached_version_when_ahead() {
        let f = fixture().await;
        f.service
            .revoke(&revoke_request("100", "g1", CHANNEL_TYPE_GROUP))
            .await
            .unwrap();
        let version = f
            .storage
            .get_message_extra("100")
            .await
            .unwrap()
            .unwrap()
            .version;

        // Moves the mark to the revoke's version.
        f.service
            .sync_extras(&extra_sync("g1", CHANNEL_TYPE_GROUP, version))
            .await
            .unwrap();
        // A request from 0 is served from the mark, not from the start.
        let views = f
            .service
            .sync_extras(&extra_sync("g1", CHANNEL_TYPE_GROUP, 0))
            .await
            .unwrap();
        assert!(views.is_empty());

        // Another source keeps its own mark.
        let mut web = extra_sync("g1", CHANNEL_TYPE_GROUP, 0);
        web.source = "web".into();
        assert_eq!(f.service.sync_extras(&web).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn extra_sync_rejects_empty_channel() {
        let f = fixture().await;
        let err = f
            .service
            .sync_extras(&extra_sync("", CHANNEL_TYPE_GROUP, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AnnexError::Validation(_)));
    }

    #[tokio::test]
    async fn extra_sync_limit_is_clamped() {
        let f = fixture().await;
        assert_eq!(f.service.extra_sync_limit(0), 100);
        assert_eq!(f.service.extra_sync_limit(-5), 100);
        assert_eq!(f.service.extra_sync_limit(50), 50);
        assert_eq!(f.service.extra_sync_limit(20_000), 10_000);
        assert_eq!(f.service.extra_sync_limit(i64::MAX), 10_000);
    }

    #[tokio::test]
    async fn delete_is_per_user_and_idempotent() {
        let f = fixture().await;
        f.service.delete(&flag("u1", "100", 1)).await.unwrap();
        f.service.delete(&flag("u1", "100", 1)).await.unwrap();

        let ids = vec!["100".to_string()];
        let mine = f.storage.get_user_extras("u1", &ids).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(mine[0].message_is_deleted);
        assert!(f.storage.get_user_extras("u2", &ids).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn voice_read_keeps_deletion() {
        let f = fixture().await;
        f.service.delete(&flag("u1", "100", 1)).await.unwrap();
        f.service.voice_readed(&flag("u1", "100", 1)).await.unwrap();
        let rows = f
            .storage
            .get_user_extras("u1", &["100".to_string()])
            .await
            .unwrap();
        assert!(rows[0].message_is_deleted);
        assert!(rows[0].voice_readed);
    }

    #[tokio::test]
    async fn invalid_delete_has_no_side_effects() {
        let f = fixture().await;
        let err = f.service.delete(&flag("u1", "100", 0)).await.unwrap_err();
        assert!(matches!(err, AnnexError::Validation(_)));
        assert!(
            f.storage
                .get_user_extras("u1", &["100".to_string()])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn channel_sync_applies_offset_and_passes_paging() {
        let f = fixture().await;
        f.service
            .raise_offset(&OffsetRequest {
                login_uid: "u1".into(),
                channel_id: "g1".into(),
                channel_type: CHANNEL_TYPE_GROUP,
                message_seq: 1,
            })
            .await
            .unwrap();
        f.store.push_channel_page(RawChannelMessages {
            start_message_seq: 1,
            end_message_seq: 2,
            pull_mode: 1,
            more: 1,
            messages: (1..=2)
                .map(|seq| RawMessage {
                    message_id: i64::from(seq),
                    message_seq: seq,
                    channel_id: "g1".into(),
                    channel_type: CHANNEL_TYPE_GROUP,
                    payload: br#"{"type":1}"#.to_vec(),
                    ..Default::default()
                })
                .collect(),
        });

        let view = f
            .service
            .sync_channel(&ChannelSyncRequest {
                login_uid: "u1".into(),
                channel_id: "g1".into(),
                channel_type: CHANNEL_TYPE_GROUP,
                start_message_seq: 1,
                end_message_seq: 0,
                limit: 50,
                pull_mode: 1,
            })
            .await
            .unwrap();
        assert_eq!(view.more, 1);
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].message_seq, 2);
        assert_eq!(f.store.channel_queries.lock().unwrap()[0].limit, 50);
    }

    #[tokio::test]
    async fn offset_never_lowers() {
        let f = fixture().await;
        for seq in [10, 4] {
            f.service
                .raise_offset(&OffsetRequest {
                    login_uid: "u1".into(),
                    channel_id: "g1".into(),
                    channel_type: CHANNEL_TYPE_GROUP,
                    message_seq: seq,
                })
                .await
                .unwrap();
        }
        let offset = f
            .storage
            .effective_channel_offset("u1", &ChannelKey::new("g1", CHANNEL_TYPE_GROUP))
            .await
            .unwrap();
        assert_eq!(offset, 10);
    }

    #[tokio::test]
    async fn clear_unread_and_subscribers_forward_upstream() {
        let f = fixture().await;
        f.service
            .clear_unread(&ClearUnreadRequest {
                login_uid: "u1".into(),
                channel_id: "g1".into(),
                channel_type: CHANNEL_TYPE_GROUP,
                unread: 0,
                message_seq: 7,
            })
            .await
            .unwrap();
        f.service
            .add_subscribers(&SubscribersRequest {
                channel_id: "g1".into(),
                channel_type: CHANNEL_TYPE_GROUP,
                reset: 1,
                subscribers: vec!["u1".into(), "u2".into()],
            })
            .await
            .unwrap();
        assert_eq!(f.store.clears.lock().unwrap()[0].message_seq, 7);
        assert_eq!(f.store.subscriber_changes.lock().unwrap()[0].reset, 1);
    }

    #[tokio::test]
    async fn failed_revoke_notice_keeps_local_row() {
        let f = fixture().await;
        f.store.fail_next("IM service failed: no channel");
        let err = f
            .service
            .revoke(&revoke_request("100", "g1", CHANNEL_TYPE_GROUP))
            .await
            .unwrap_err();
        assert!(matches!(err, AnnexError::Upstream { .. }));
        assert!(f.storage.get_message_extra("100").await.unwrap().unwrap().revoke);
    }
}
