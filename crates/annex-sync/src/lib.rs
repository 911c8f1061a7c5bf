// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental sync engine for the Annex metadata overlay.
//!
//! The [`MergeEngine`] joins raw messages with the overlay stores, the
//! [`ConversationCoordinator`] runs the pull/ack cursor protocol, and the
//! [`MessageService`] handles per-message mutations and channel pulls. All
//! three depend only on the adapter traits from `annex-core`.

pub mod conversation;
pub mod cursor;
pub mod merge;
pub mod message;
pub mod request;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::time::Duration;

use annex_core::AnnexError;

pub use conversation::ConversationCoordinator;
pub use cursor::MemoryCursorCache;
pub use merge::{DeletionReason, MergeEngine};
pub use message::MessageService;

/// Awaits an IM core call, failing with [`AnnexError::Timeout`] past `limit`.
pub(crate) async fn upstream_call<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, AnnexError>>,
) -> Result<T, AnnexError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| AnnexError::Timeout { duration: limit })?
}
