// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter for the external, authoritative message store (the IM core).

use async_trait::async_trait;

use crate::error::AnnexError;
use crate::im::{
    ChannelMessageQuery, ClearUnread, ConversationQuery, RawChannelMessages, RawConversation,
    RevokeNotice, SubscriberChange,
};
use crate::traits::adapter::PluginAdapter;

/// Read contract plus the narrow outbound notifications the overlay issues.
///
/// Outbound calls are fire-and-forget from the overlay's point of view: a
/// failure surfaces to the caller but nothing local is rolled back.
#[async_trait]
pub trait MessageStoreAdapter: PluginAdapter {
    /// Conversations updated since `query.version`, each with up to
    /// `query.msg_count` recent messages.
    async fn fetch_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<Vec<RawConversation>, AnnexError>;

    /// A window of messages from one channel.
    async fn fetch_channel_messages(
        &self,
        query: &ChannelMessageQuery,
    ) -> Result<RawChannelMessages, AnnexError>;

    /// Tells the channel's members that a message was revoked.
    async fn send_revoke(&self, notice: &RevokeNotice) -> Result<(), AnnexError>;

    /// Adds (or resets) channel subscribers.
    async fn add_subscribers(&self, change: &SubscriberChange) -> Result<(), AnnexError>;

    /// Clears a conversation's unread counter for one user.
    async fn clear_conversation_unread(&self, req: &ClearUnread) -> Result<(), AnnexError>;
}
