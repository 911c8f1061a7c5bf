// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Version cursor cache: last-synchronized versions per device and per user.

use async_trait::async_trait;

use crate::error::AnnexError;

/// Key-value cache of synchronization watermarks.
///
/// A version of 0 means "absent". Writes only ever raise a stored version;
/// a lower value leaves it unchanged. Implementations are constructed once per
/// process and injected; they are the cross-process source of truth for
/// committed watermarks.
#[async_trait]
pub trait VersionCursorCache: Send + Sync + 'static {
    /// Device-level conversation watermark.
    async fn device_version(&self, uid: &str, device_id: &str) -> Result<i64, AnnexError>;

    async fn set_device_version(
        &self,
        uid: &str,
        device_id: &str,
        version: i64,
    ) -> Result<(), AnnexError>;

    /// User-level conversation watermark, advanced only by an acknowledgement.
    async fn user_version(&self, uid: &str) -> Result<i64, AnnexError>;

    async fn set_user_version(&self, uid: &str, version: i64) -> Result<(), AnnexError>;

    /// Highest extra version a (user, source) pair has asked for on a channel.
    async fn extra_version(
        &self,
        uid: &str,
        source: &str,
        channel_key: &str,
    ) -> Result<i64, AnnexError>;

    async fn set_extra_version(
        &self,
        uid: &str,
        source: &str,
        channel_key: &str,
        version: i64,
    ) -> Result<(), AnnexError>;
}
