// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Schema preparation (migrations, shard tables) runs once on a short-lived
//! blocking connection before that thread is started.

use std::path::Path;

use annex_config::model::StorageConfig;
use annex_core::AnnexError;
use tracing::{debug, info};

use crate::migrations;
use crate::partition::{self, Partitioner};

/// Handle to the overlay database.
///
/// Cloning is cheap; clones share the same background connection thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    partitioner: Partitioner,
}

impl Database {
    /// Opens (creating if needed) a database with default storage settings.
    pub async fn open(path: &str) -> Result<Self, AnnexError> {
        let config = StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        };
        Self::open_with_config(&config).await
    }

    /// Opens the database described by `config`, applying migrations and
    /// checking the user extra partition count.
    pub async fn open_with_config(config: &StorageConfig) -> Result<Self, AnnexError> {
        let partitioner = Partitioner::new(config.user_extra_table_count)?;
        let path = config.database_path.clone();
        let wal_mode = config.wal_mode;

        if let Some(parent) = Path::new(&path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }

        let prepare_path = path.clone();
        tokio::task::spawn_blocking(move || prepare(&prepare_path, wal_mode, partitioner))
            .await
            .map_err(|e| AnnexError::Internal(format!("schema preparation panicked: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(storage_err)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> { apply_connection_pragmas(conn) })
            .await
            .map_err(map_tr_err)?;

        info!(path = %path, partitions = partitioner.count(), "database opened");
        Ok(Self { conn, partitioner })
    }

    /// The single-writer connection. Query modules go through `call()`.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    /// Checkpoints the WAL and closes the connection.
    pub async fn close(self) -> Result<(), AnnexError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(storage_err)?;
        debug!("database closed");
        Ok(())
    }
}

fn prepare(path: &str, wal_mode: bool, partitioner: Partitioner) -> Result<(), AnnexError> {
    let mut conn = rusqlite::Connection::open(path).map_err(storage_err)?;
    if wal_mode {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(storage_err)?;
    }
    apply_connection_pragmas(&conn).map_err(storage_err)?;
    migrations::run_migrations(&mut conn)?;
    partition::ensure_layout(&conn, partitioner)?;
    Ok(())
}

fn apply_connection_pragmas(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )
}

/// Current time in the format stored in `created_at` / `updated_at`.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

pub(crate) fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> AnnexError {
    AnnexError::Storage {
        source: Box::new(e),
    }
}

/// Convert a tokio-rusqlite error into [`AnnexError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> AnnexError {
    storage_err(e)
}
