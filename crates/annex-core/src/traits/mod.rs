// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Backends extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch compatibility, so the sync engine only ever holds
//! `Arc<dyn ...>` handles.

pub mod adapter;
pub mod cursor;
pub mod message_store;
pub mod storage;

pub use adapter::PluginAdapter;
pub use cursor::VersionCursorCache;
pub use message_store::MessageStoreAdapter;
pub use storage::StorageAdapter;
