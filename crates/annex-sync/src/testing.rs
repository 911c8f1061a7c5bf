// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unit-test doubles for the sync engine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use annex_config::model::StorageConfig;
use annex_core::im::{
    ChannelMessageQuery, ClearUnread, ConversationQuery, RawChannelMessages, RawConversation,
    RevokeNotice, SubscriberChange,
};
use annex_core::types::HealthStatus;
use annex_core::{AnnexError, MessageStoreAdapter, PluginAdapter, StorageAdapter};
use annex_storage::SqliteStorage;
use async_trait::async_trait;

pub async fn temp_storage() -> (Arc<SqliteStorage>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        database_path: dir.path().join("sync.db").to_string_lossy().into_owned(),
        wal_mode: true,
        user_extra_table_count: 3,
    };
    let storage = SqliteStorage::new(config);
    storage.initialize().await.unwrap();
    (Arc::new(storage), dir)
}

/// Message store that replays queued responses and records every call.
#[derive(Default)]
pub struct ScriptedStore {
    conversations: Mutex<VecDeque<Vec<RawConversation>>>,
    channel_pages: Mutex<VecDeque<RawChannelMessages>>,
    failure: Mutex<Option<String>>,
    pub conversation_queries: Mutex<Vec<ConversationQuery>>,
    pub channel_queries: Mutex<Vec<ChannelMessageQuery>>,
    pub revokes: Mutex<Vec<RevokeNotice>>,
    pub subscriber_changes: Mutex<Vec<SubscriberChange>>,
    pub clears: Mutex<Vec<ClearUnread>>,
}

impl ScriptedStore {
    pub fn push_conversations(&self, conversations: Vec<RawConversation>) {
        self.conversations.lock().unwrap().push_back(conversations);
    }

    pub fn push_channel_page(&self, page: RawChannelMessages) {
        self.channel_pages.lock().unwrap().push_back(page);
    }

    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn last_conversation_query(&self) -> Option<ConversationQuery> {
        self.conversation_queries.lock().unwrap().last().cloned()
    }

    fn take_failure(&self) -> Result<(), AnnexError> {
        match self.failure.lock().unwrap().take() {
            Some(message) => Err(AnnexError::upstream(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PluginAdapter for ScriptedStore {
    fn name(&self) -> &str {
        "scripted-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, AnnexError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AnnexError> {
        Ok(())
    }
}

#[async_trait]
impl MessageStoreAdapter for ScriptedStore {
    async fn fetch_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<Vec<RawConversation>, AnnexError> {
        self.conversation_queries.lock().unwrap().push(query.clone());
        self.take_failure()?;
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn fetch_channel_messages(
        &self,
        query: &ChannelMessageQuery,
    ) -> Result<RawChannelMessages, AnnexError> {
        self.channel_queries.lock().unwrap().push(query.clone());
        self.take_failure()?;
        Ok(self
            .channel_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn send_revoke(&self, notice: &RevokeNotice) -> Result<(), AnnexError> {
        self.revokes.lock().unwrap().push(notice.clone());
        self.take_failure()
    }

    async fn add_subscribers(&self, change: &SubscriberChange) -> Result<(), AnnexError> {
        self.subscriber_changes.lock().unwrap().push(change.clone());
        self.take_failure()
    }

    async fn clear_conversation_unread(&self, req: &ClearUnread) -> Result<(), AnnexError> {
        self.clears.lock().unwrap().push(req.clone());
        self.take_failure()
    }
}
