// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use annex_config::model::StorageConfig;
use annex_core::{
    AnnexError, ChannelKey, ChannelOffset, GlobalExtra, HealthStatus, PluginAdapter,
    StorageAdapter, UserExtra,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// The underlying database, for components sharing the connection
    /// (such as the SQLite cursor cache).
    pub fn database(&self) -> Result<&Database, AnnexError> {
        self.db.get().ok_or_else(|| AnnexError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(&self, db: &Database) -> Result<(), AnnexError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, AnnexError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AnnexError> {
        if let Some(db) = self.db.get() {
            self.checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), AnnexError> {
        let db = Database::open_with_config(&self.config).await?;
        self.db.set(db).map_err(|_| AnnexError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), AnnexError> {
        let db = self.database()?;
        self.checkpoint(db).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Global extra ---

    async fn insert_message_extra(&self, extra: &GlobalExtra) -> Result<(), AnnexError> {
        queries::message_extra::insert(self.database()?, extra).await
    }

    async fn update_message_extra(&self, extra: &GlobalExtra) -> Result<(), AnnexError> {
        queries::message_extra::update(self.database()?, extra).await
    }

    async fn get_message_extra(
        &self,
        message_id: &str,
    ) -> Result<Option<GlobalExtra>, AnnexError> {
        queries::message_extra::get(self.database()?, message_id).await
    }

    async fn get_message_extras(
        &self,
        message_ids: &[String],
    ) -> Result<Vec<GlobalExtra>, AnnexError> {
        queries::message_extra::get_many(self.database()?, message_ids).await
    }

    async fn sync_message_extras(
        &self,
        version: i64,
        channel: &ChannelKey,
        limit: u32,
    ) -> Result<Vec<GlobalExtra>, AnnexError> {
        queries::message_extra::sync(self.database()?, version, channel, limit).await
    }

    // --- User extra ---

    async fn insert_user_extra(&self, row: &UserExtra) -> Result<(), AnnexError> {
        queries::user_extra::insert(self.database()?, row).await
    }

    async fn upsert_user_extra_deleted(&self, row: &UserExtra) -> Result<(), AnnexError> {
        queries::user_extra::upsert_deleted(self.database()?, row).await
    }

    async fn upsert_user_extra_voice_readed(&self, row: &UserExtra) -> Result<(), AnnexError> {
        queries::user_extra::upsert_voice_readed(self.database()?, row).await
    }

    async fn get_user_extras(
        &self,
        uid: &str,
        message_ids: &[String],
    ) -> Result<Vec<UserExtra>, AnnexError> {
        queries::user_extra::get_for_user(self.database()?, uid, message_ids).await
    }

    // --- Channel offset ---

    async fn raise_channel_offset(&self, offset: &ChannelOffset) -> Result<(), AnnexError> {
        queries::channel_offset::raise(self.database()?, offset).await
    }

    async fn effective_channel_offset(
        &self,
        uid: &str,
        channel: &ChannelKey,
    ) -> Result<u32, AnnexError> {
        queries::channel_offset::effective(self.database()?, uid, channel).await
    }

    async fn effective_channel_offsets(
        &self,
        uid: &str,
        channel_ids: &[String],
    ) -> Result<HashMap<ChannelKey, u32>, AnnexError> {
        queries::channel_offset::effective_many(self.database()?, uid, channel_ids).await
    }
}
