// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Annex metadata overlay.
//!
//! This crate provides the domain types, wire types, error type, and adapter
//! traits shared by every other crate in the workspace. Backends implement the
//! traits defined here; the sync engine only depends on the traits.

pub mod clock;
pub mod error;
pub mod im;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::VersionClock;
pub use error::AnnexError;
pub use types::{
    ChannelKey, ChannelOffset, GlobalExtra, HealthStatus, MessageSetting, UserExtra,
};

// Re-export all adapter traits at crate root.
pub use traits::{MessageStoreAdapter, PluginAdapter, StorageAdapter, VersionCursorCache};
