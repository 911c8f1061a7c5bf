// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Version cursor cache persisted next to the overlay stores.

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};

use annex_core::{AnnexError, VersionCursorCache};

use crate::database::{Database, map_tr_err, now_timestamp};

/// SQLite-backed [`VersionCursorCache`]. Committed watermarks survive restarts.
#[derive(Clone)]
pub struct SqliteCursorCache {
    db: Database,
}

impl SqliteCursorCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn read(&self, sql: &'static str, keys: Vec<String>) -> Result<i64, AnnexError> {
        self.db
            .connection()
            .call(move |conn| {
                let version: Option<i64> = conn
                    .query_row(sql, rusqlite::params_from_iter(keys.iter()), |row| row.get(0))
                    .optional()?;
                Ok(version.unwrap_or(0))
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl VersionCursorCache for SqliteCursorCache {
    async fn device_version(&self, uid: &str, device_id: &str) -> Result<i64, AnnexError> {
        self.read(
            "SELECT version FROM device_version_cursor WHERE uid = ?1 AND device_id = ?2",
            vec![uid.to_string(), device_id.to_string()],
        )
        .await
    }

    async fn set_device_version(
        &self,
        uid: &str,
        device_id: &str,
        version: i64,
    ) -> Result<(), AnnexError> {
        let (uid, device_id, now) = (uid.to_string(), device_id.to_string(), now_timestamp());
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO device_version_cursor (uid, device_id, version, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(uid, device_id) DO UPDATE
                     SET version = MAX(version, excluded.version), updated_at = excluded.updated_at",
                    params![uid, device_id, version, now],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn user_version(&self, uid: &str) -> Result<i64, AnnexError> {
        self.read(
            "SELECT version FROM user_version_cursor WHERE uid = ?1",
            vec![uid.to_string()],
        )
        .await
    }

    async fn set_user_version(&self, uid: &str, version: i64) -> Result<(), AnnexError> {
        let (uid, now) = (uid.to_string(), now_timestamp());
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO user_version_cursor (uid, version, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(uid) DO UPDATE
                     SET version = MAX(version, excluded.version), updated_at = excluded.updated_at",
                    params![uid, version, now],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn extra_version(
        &self,
        uid: &str,
        source: &str,
        channel_key: &str,
    ) -> Result<i64, AnnexError> {
        self.read(
            "SELECT version FROM extra_version_cursor
             WHERE uid = ?1 AND source = ?2 AND channel_key = ?3",
            vec![uid.to_string(), source.to_string(), channel_key.to_string()],
        )
        .await
    }

    async fn set_extra_version(
        &self,
        uid: &str,
        source: &str,
        channel_key: &str,
        version: i64,
    ) -> Result<(), AnnexError> {
        let (uid, source, channel_key, now) = (
            uid.to_string(),
            source.to_string(),
            channel_key.to_string(),
            now_timestamp(),
        );
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO extra_version_cursor (uid, source, channel_key, version, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(uid, source, channel_key) DO UPDATE
                     SET version = MAX(version, excluded.version), updated_at = excluded.updated_at",
                    params![uid, source, channel_key, version, now],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}
