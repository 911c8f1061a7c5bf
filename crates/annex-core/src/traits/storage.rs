// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the overlay stores.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AnnexError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelKey, ChannelOffset, GlobalExtra, UserExtra};

/// Adapter for the three persistent overlay stores.
///
/// The stores are updated independently; no operation spans more than one of
/// them, and readers treat a missing row as "no override yet".
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, partitions, connection).
    async fn initialize(&self) -> Result<(), AnnexError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), AnnexError>;

    // --- Global extra ---

    /// Create-only insert; `Conflict` if the message id already exists.
    async fn insert_message_extra(&self, extra: &GlobalExtra) -> Result<(), AnnexError>;

    /// Overwrites the mutable columns of an existing row; `NotFound` if absent.
    async fn update_message_extra(&self, extra: &GlobalExtra) -> Result<(), AnnexError>;

    async fn get_message_extra(&self, message_id: &str)
    -> Result<Option<GlobalExtra>, AnnexError>;

    /// Batch lookup; unmatched ids produce no entry.
    async fn get_message_extras(&self, message_ids: &[String])
    -> Result<Vec<GlobalExtra>, AnnexError>;

    /// Rows of a channel after `version`, ascending. Version 0 bootstraps with
    /// the latest `limit` rows.
    async fn sync_message_extras(
        &self,
        version: i64,
        channel: &ChannelKey,
        limit: u32,
    ) -> Result<Vec<GlobalExtra>, AnnexError>;

    // --- User extra ---

    async fn insert_user_extra(&self, row: &UserExtra) -> Result<(), AnnexError>;

    /// Idempotent upsert touching only the deletion flag on conflict.
    async fn upsert_user_extra_deleted(&self, row: &UserExtra) -> Result<(), AnnexError>;

    /// Idempotent upsert touching only the voice-read flag on conflict.
    async fn upsert_user_extra_voice_readed(&self, row: &UserExtra) -> Result<(), AnnexError>;

    /// Rows of one user for the given messages, read from that user's shard only.
    async fn get_user_extras(
        &self,
        uid: &str,
        message_ids: &[String],
    ) -> Result<Vec<UserExtra>, AnnexError>;

    // --- Channel offset ---

    /// Raises the stored offset; a lower sequence leaves it unchanged.
    async fn raise_channel_offset(&self, offset: &ChannelOffset) -> Result<(), AnnexError>;

    /// Max of the user's row and the shared floor row, 0 when neither exists.
    async fn effective_channel_offset(
        &self,
        uid: &str,
        channel: &ChannelKey,
    ) -> Result<u32, AnnexError>;

    /// Batched [`effective_channel_offset`](Self::effective_channel_offset)
    /// over many channel ids, aggregated in one query.
    async fn effective_channel_offsets(
        &self,
        uid: &str,
        channel_ids: &[String],
    ) -> Result<HashMap<ChannelKey, u32>, AnnexError>;
}
