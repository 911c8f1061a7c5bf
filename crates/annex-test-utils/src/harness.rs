// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the real sync services over a temp SQLite
//! database, a [`MockMessageStore`] and an in-memory cursor cache.

use std::sync::Arc;
use std::time::Duration;

use annex_config::model::{AnnexConfig, StorageConfig, SyncConfig};
use annex_core::{AnnexError, StorageAdapter, VersionCursorCache};
use annex_storage::SqliteStorage;
use annex_sync::{ConversationCoordinator, MemoryCursorCache, MessageService};

use crate::mock_store::MockMessageStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    share_across_devices: bool,
    user_extra_table_count: u32,
    upstream_timeout: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            share_across_devices: false,
            user_extra_table_count: 3,
            upstream_timeout: Duration::from_secs(5),
        }
    }

    /// Enable cross-device history sharing (no cursor tracking).
    pub fn with_sharing(mut self, enabled: bool) -> Self {
        self.share_across_devices = enabled;
        self
    }

    /// Set the number of user extra shards.
    pub fn with_table_count(mut self, count: u32) -> Self {
        self.user_extra_table_count = count;
        self
    }

    /// Set the IM core call timeout.
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Build the harness, creating and migrating a fresh database.
    pub async fn build(self) -> Result<TestHarness, AnnexError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| AnnexError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = AnnexConfig {
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().into_owned(),
                wal_mode: true,
                user_extra_table_count: self.user_extra_table_count,
            },
            sync: SyncConfig {
                message_save_across_device: self.share_across_devices,
                ..SyncConfig::default()
            },
            ..AnnexConfig::default()
        };
        config.upstream.timeout_secs = self.upstream_timeout.as_secs().max(1);

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        let store = Arc::new(MockMessageStore::new());
        let cursors: Arc<dyn VersionCursorCache> = Arc::new(MemoryCursorCache::new());

        let coordinator = Arc::new(ConversationCoordinator::new(
            storage.clone(),
            store.clone(),
            cursors.clone(),
            config.sync.clone(),
            self.upstream_timeout,
        ));
        let messages = Arc::new(MessageService::new(
            storage.clone(),
            store.clone(),
            cursors.clone(),
            config.sync.clone(),
            self.upstream_timeout,
        ));

        Ok(TestHarness {
            store,
            storage,
            cursors,
            coordinator,
            messages,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock IM core and temp storage.
pub struct TestHarness {
    /// The scripted IM core.
    pub store: Arc<MockMessageStore>,
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    /// In-memory version cursors.
    pub cursors: Arc<dyn VersionCursorCache>,
    pub coordinator: Arc<ConversationCoordinator>,
    pub messages: Arc<MessageService>,
    /// Configuration the services were built from.
    pub config: AnnexConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default options.
    pub async fn new() -> Result<Self, AnnexError> {
        Self::builder().build().await
    }
}
