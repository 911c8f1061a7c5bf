// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Annex overlay stores.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, the partitioned user extra shards,
//! and a persistent version cursor cache.

pub mod adapter;
pub mod cursor;
pub mod database;
pub mod migrations;
pub mod partition;
pub mod queries;
pub mod repartition;

pub use adapter::SqliteStorage;
pub use cursor::SqliteCursorCache;
pub use database::Database;
pub use partition::Partitioner;
pub use repartition::{RepartitionReport, repartition};
