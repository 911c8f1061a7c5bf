// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock IM core for deterministic testing.
//!
//! `MockMessageStore` implements `MessageStoreAdapter` with queued responses
//! and records every outbound call for later assertions.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use annex_core::im::{
    ChannelMessageQuery, ClearUnread, ConversationQuery, RawChannelMessages, RawConversation,
    RevokeNotice, SubscriberChange,
};
use annex_core::traits::adapter::PluginAdapter;
use annex_core::traits::message_store::MessageStoreAdapter;
use annex_core::types::HealthStatus;
use annex_core::AnnexError;

/// Calls the overlay made against the IM core.
#[derive(Debug, Default, Clone)]
pub struct RecordedCalls {
    pub conversation_queries: Vec<ConversationQuery>,
    pub channel_queries: Vec<ChannelMessageQuery>,
    pub revokes: Vec<RevokeNotice>,
    pub subscriber_changes: Vec<SubscriberChange>,
    pub clears: Vec<ClearUnread>,
}

#[derive(Default)]
struct Script {
    conversations: VecDeque<Vec<RawConversation>>,
    channel_pages: VecDeque<RawChannelMessages>,
    failures: VecDeque<String>,
    health: Option<HealthStatus>,
}

/// An IM core double.
///
/// Responses are popped from FIFO queues; an empty queue yields an empty
/// result. A queued failure is returned by the next call of any kind.
#[derive(Default)]
pub struct MockMessageStore {
    script: Mutex<Script>,
    calls: Mutex<RecordedCalls>,
}

impl MockMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response of the next conversation pull.
    pub async fn push_conversations(&self, conversations: Vec<RawConversation>) {
        self.script.lock().await.conversations.push_back(conversations);
    }

    /// Queue the response of the next channel pull.
    pub async fn push_channel_page(&self, page: RawChannelMessages) {
        self.script.lock().await.channel_pages.push_back(page);
    }

    /// Make the next call fail with an upstream error.
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.script.lock().await.failures.push_back(message.into());
    }

    /// Status returned by every later health check.
    pub async fn set_health(&self, status: HealthStatus) {
        self.script.lock().await.health = Some(status);
    }

    /// Snapshot of every call made so far.
    pub async fn calls(&self) -> RecordedCalls {
        self.calls.lock().await.clone()
    }

    async fn check_failure(&self) -> Result<(), AnnexError> {
        match self.script.lock().await.failures.pop_front() {
            Some(message) => Err(AnnexError::upstream(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PluginAdapter for MockMessageStore {
    fn name(&self) -> &str {
        "mock-im"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, AnnexError> {
        Ok(self
            .script
            .lock()
            .await
            .health
            .clone()
            .unwrap_or(HealthStatus::Healthy))
    }

    async fn shutdown(&self) -> Result<(), AnnexError> {
        Ok(())
    }
}

#[async_trait]
impl MessageStoreAdapter for MockMessageStore {
    async fn fetch_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<Vec<RawConversation>, AnnexError> {
        self.calls.lock().await.conversation_queries.push(query.clone());
        self.check_failure().await?;
        Ok(self
            .script
            .lock()
            .await
            .conversations
            .pop_front()
            .unwrap_or_default())
    }

    async fn fetch_channel_messages(
        &self,
        query: &ChannelMessageQuery,
    ) -> Result<RawChannelMessages, AnnexError> {
        self.calls.lock().await.channel_queries.push(query.clone());
        self.check_failure().await?;
        Ok(self
            .script
            .lock()
            .await
            .channel_pages
            .pop_front()
            .unwrap_or_default())
    }

    async fn send_revoke(&self, notice: &RevokeNotice) -> Result<(), AnnexError> {
        self.calls.lock().await.revokes.push(notice.clone());
        self.check_failure().await
    }

    async fn add_subscribers(&self, change: &SubscriberChange) -> Result<(), AnnexError> {
        self.calls.lock().await.subscriber_changes.push(change.clone());
        self.check_failure().await
    }

    async fn clear_conversation_unread(&self, req: &ClearUnread) -> Result<(), AnnexError> {
        self.calls.lock().await.clears.push(req.clone());
        self.check_failure().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_responses_are_fifo() {
        let store = MockMessageStore::new();
        store
            .push_conversations(vec![RawConversation {
                channel_id: "g1".into(),
                channel_type: 2,
                ..Default::default()
            }])
            .await;
        let query = ConversationQuery::default();
        assert_eq!(store.fetch_conversations(&query).await.unwrap().len(), 1);
        assert!(store.fetch_conversations(&query).await.unwrap().is_empty());
        assert_eq!(store.calls().await.conversation_queries.len(), 2);
    }

    #[tokio::test]
    async fn failure_applies_to_one_call() {
        let store = MockMessageStore::new();
        store.fail_next("IM down").await;
        let query = ConversationQuery::default();
        assert!(store.fetch_conversations(&query).await.is_err());
        assert!(store.fetch_conversations(&query).await.is_ok());
    }

    #[tokio::test]
    async fn outbound_calls_are_recorded() {
        let store = MockMessageStore::new();
        store
            .send_revoke(&RevokeNotice {
                operator: "u1".into(),
                channel_id: "g1".into(),
                channel_type: 2,
                message_id: 100,
                client_msg_no: String::new(),
            })
            .await
            .unwrap();
        let calls = store.calls().await;
        assert_eq!(calls.revokes.len(), 1);
        assert_eq!(calls.revokes[0].message_id, 100);
    }
}
