// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Annex metadata overlay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Annex configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnnexConfig {
    /// HTTP listener and logging.
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite overlay stores.
    #[serde(default)]
    pub storage: StorageConfig,

    /// External IM core.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Sync protocol behavior.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Number of physical user-extra shard tables.
    ///
    /// Fixed once the database is created; change it with `annex repartition`.
    #[serde(default = "default_user_extra_table_count")]
    pub user_extra_table_count: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            user_extra_table_count: default_user_extra_table_count(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("annex").join("annex.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("annex.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_user_extra_table_count() -> u32 {
    5
}

/// External IM core configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the IM core's HTTP API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Where version cursors live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorBackend {
    /// Persisted in the overlay database; survives restarts.
    #[default]
    Sqlite,
    /// Process-local map; lost on restart.
    Memory,
}

/// Sync protocol configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// When true every device sees full history and cursors are not tracked.
    #[serde(default)]
    pub message_save_across_device: bool,

    #[serde(default)]
    pub cursor_backend: CursorBackend,

    /// Extra sync page size used when the client sends a limit of 0 or less.
    #[serde(default = "default_extra_sync_default_limit")]
    pub extra_sync_default_limit: u32,

    /// Upper bound on the extra sync page size.
    #[serde(default = "default_extra_sync_max_limit")]
    pub extra_sync_max_limit: u32,

    /// Recent messages per conversation when the client sends 0.
    #[serde(default = "default_msg_count")]
    pub default_msg_count: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            message_save_across_device: false,
            cursor_backend: CursorBackend::default(),
            extra_sync_default_limit: default_extra_sync_default_limit(),
            extra_sync_max_limit: default_extra_sync_max_limit(),
            default_msg_count: default_msg_count(),
        }
    }
}

fn default_extra_sync_default_limit() -> u32 {
    100
}

fn default_extra_sync_max_limit() -> u32 {
    10000
}

fn default_msg_count() -> i64 {
    20
}
