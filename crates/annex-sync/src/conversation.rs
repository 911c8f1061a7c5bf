// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation sync coordinator.
//!
//! Implements the two-phase pull/acknowledge handshake: a pull resolves the
//! starting version from the cursor cache, fetches from the IM core, merges,
//! and records a pending watermark; a later ack commits that watermark.
//! When cross-device history sharing is enabled no cursor is tracked and the
//! client's version is used verbatim.

use std::sync::Arc;
use std::time::Duration;

use annex_config::model::SyncConfig;
use annex_core::im::{ConversationQuery, RawConversation};
use annex_core::{
    AnnexError, ChannelKey, MessageStoreAdapter, StorageAdapter, VersionCursorCache,
};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::merge::MergeEngine;
use crate::request::{SyncAckRequest, SyncConversationRequest};
use crate::upstream_call;
use crate::view::{ConversationView, SyncConversationResponse};

/// Coordinates conversation pulls and acknowledgements.
pub struct ConversationCoordinator {
    storage: Arc<dyn StorageAdapter>,
    store: Arc<dyn MessageStoreAdapter>,
    cursors: Arc<dyn VersionCursorCache>,
    merge: MergeEngine,
    config: SyncConfig,
    upstream_timeout: Duration,
    /// Highest version served per user and not yet acknowledged.
    pending: DashMap<String, i64>,
    /// Highest version served to each `(uid, device)` and not yet acknowledged.
    device_pending: DashMap<(String, String), i64>,
}

impl ConversationCoordinator {
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
            config,
            upstream_timeout,
            pending: DashMap::new(),
            device_pending: DashMap::new(),
        }
    }

    fn tracks_cursors(&self) -> bool {
        !self.config.message_save_across_device
    }

    /// Resolves the version a pull starts from.
    ///
    /// The device cursor wins; a device without one inherits the user cursor,
    /// which is also written back as the device's cursor. The result never goes
    /// below what the client already holds.
    pub async fn resolve_version(
        &self,
        uid: &str,
        device_id: &str,
        client_version: i64,
    ) -> Result<i64, AnnexError> {
        if !self.tracks_cursors() {
            return Ok(client_version);
        }
        let mut cached = self.cursors.device_version(uid, device_id).await?;
        if cached == 0 {
            let user_version = self.cursors.user_version(uid).await?;
            if user_version > 0 {
                self.cursors
                    .set_device_version(uid, device_id, user_version)
                    .await?;
                debug!(uid, device_id, user_version, "seeded device cursor from user cursor");
            }
            cached = user_version;
        }
        Ok(client_version.max(cached))
    }

    /// Pulls conversations changed since the resolved version.
    pub async fn sync(
        &self,
        req: &SyncConversationRequest,
    ) -> Result<SyncConversationResponse, AnnexError> {
        req.validate()?;
        let uid = req.login_uid.as_str();
        let version = self
            .resolve_version(uid, &req.device_uuid, req.version)
            .await?;
        let msg_count = if req.msg_count > 0 {
            req.msg_count
        } else {
            self.config.default_msg_count
        };

        let query = ConversationQuery {
            uid: uid.to_string(),
            version,
            last_msg_seqs: req.last_msg_seqs.clone(),
            msg_count,
        };
        let raw = upstream_call(self.upstream_timeout, self.store.fetch_conversations(&query))
            .await?;
        let fetched = raw.len();
        let conversations = self.hydrate(uid, raw).await?;

        if self.tracks_cursors()
            && let Some(latest) = conversations.iter().map(|c| c.version).max()
            && latest > 0
        {
            self.raise_pending(uid, &req.device_uuid, latest);
        }

        debug!(uid, version, fetched, returned = conversations.len(), "conversation sync");
        Ok(SyncConversationResponse {
            uid: uid.to_string(),
            conversations,
        })
    }

    /// Merges each conversation's recents for `uid`.
    ///
    /// Conversations left without recents after merging and offset
    /// suppression are dropped.
    pub async fn hydrate(
        &self,
        uid: &str,
        raw: Vec<RawConversation>,
    ) -> Result<Vec<ConversationView>, AnnexError> {
        let channel_ids: Vec<String> = raw
            .iter()
            .filter(|c| !c.recents.is_empty())
            .map(|c| c.channel_id.clone())
            .collect();
        let offsets = if channel_ids.is_empty() {
            Default::default()
        } else {
            self.storage.effective_channel_offsets(uid, &channel_ids).await?
        };

        let mut views = Vec::with_capacity(raw.len());
        for conversation in raw {
            let key = ChannelKey::new(conversation.channel_id.clone(), conversation.channel_type);
            let offset = offsets.get(&key).copied().unwrap_or(0);
            let recents = self.merge.merge(uid, conversation.recents, offset).await?;
            if recents.is_empty() {
                continue;
            }
            let last_client_msg_no = recents
                .iter()
                .find(|m| m.is_deleted == 0)
                .map(|m| m.client_msg_no.clone())
                .unwrap_or(conversation.last_client_msg_no);
            views.push(ConversationView {
                channel_id: conversation.channel_id,
                channel_type: conversation.channel_type,
                unread: conversation.unread,
                timestamp: conversation.timestamp,
                last_msg_seq: conversation.last_msg_seq,
                last_client_msg_no,
                offset_msg_seq: conversation.offset_msg_seq.max(i64::from(offset)),
                version: conversation.version,
                recents,
            });
        }
        Ok(views)
    }

    fn raise_pending(&self, uid: &str, device_id: &str, version: i64) {
        let mut entry = self.pending.entry(uid.to_string()).or_insert(0);
        *entry = (*entry).max(version);
        drop(entry);
        if !device_id.is_empty() {
            let mut entry = self
                .device_pending
                .entry((uid.to_string(), device_id.to_string()))
                .or_insert(0);
            *entry = (*entry).max(version);
        }
    }

    /// Version served to `uid` and not yet acknowledged, 0 if none.
    pub fn pending_version(&self, uid: &str) -> i64 {
        self.pending.get(uid).map_or(0, |v| *v)
    }

    /// Version served to this device of `uid` and not yet acknowledged.
    pub fn device_pending_version(&self, uid: &str, device_id: &str) -> i64 {
        self.device_pending
            .get(&(uid.to_string(), device_id.to_string()))
            .map_or(0, |v| *v)
    }

    /// Commits the pending watermarks.
    ///
    /// The user cursor takes the user's watermark. The acking device's cursor
    /// only takes what that device itself was served, so a device never moves
    /// past data pulled by another one.
    pub async fn ack(&self, req: &SyncAckRequest) -> Result<(), AnnexError> {
        req.validate()?;
        if !self.tracks_cursors() {
            return Ok(());
        }
        let uid = req.login_uid.as_str();
        let version = self.pending_version(uid);
        let device_version = self.device_pending_version(uid, &req.device_uuid);
        if version <= 0 && device_version <= 0 {
            debug!(uid, "ack with nothing pending");
            return Ok(());
        }

        if version > 0 {
            self.cursors.set_user_version(uid, version).await?;
            self.pending.remove_if(uid, |_, current| *current == version);
        }
        if device_version > 0 {
            self.cursors
                .set_device_version(uid, &req.device_uuid, device_version)
                .await?;
            self.device_pending.remove_if(
                &(uid.to_string(), req.device_uuid.clone()),
                |_, current| *current == device_version,
            );
        }
        info!(uid, device = %req.device_uuid, version, device_version, "conversation cursor committed");
        Ok(())
    }
}
