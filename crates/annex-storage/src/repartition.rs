// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline migration of user extra rows to a new shard count.
//!
//! Runs on its own connection while the server is stopped. Everything happens
//! in one transaction: a failure leaves the old layout untouched.

use annex_core::AnnexError;
use rusqlite::{Connection, params};
use tracing::info;

use crate::database::storage_err;
use crate::migrations;
use crate::partition::{self, Partitioner};

/// Outcome of a repartition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepartitionReport {
    pub from: u32,
    pub to: u32,
    pub rows: usize,
    /// Rows whose shard changed.
    pub moved: usize,
}

struct ShardRow {
    uid: String,
    message_id: String,
    message_seq: i64,
    channel_id: String,
    channel_type: i64,
    message_is_deleted: bool,
    voice_readed: bool,
    created_at: String,
    updated_at: String,
}

/// Moves every user extra row to `crc32(uid) mod new_count` and records the
/// new count.
pub async fn repartition(db_path: &str, new_count: u32) -> Result<RepartitionReport, AnnexError> {
    let target = Partitioner::new(new_count)?;
    let path = db_path.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = Connection::open(&path).map_err(storage_err)?;
        migrations::run_migrations(&mut conn)?;
        repartition_conn(&mut conn, target)
    })
    .await
    .map_err(|e| AnnexError::Internal(format!("repartition task panicked: {e}")))?
}

fn repartition_conn(
    conn: &mut Connection,
    target: Partitioner,
) -> Result<RepartitionReport, AnnexError> {
    let tx = conn.transaction().map_err(storage_err)?;

    let from = partition::stored_count(&tx)
        .map_err(storage_err)?
        .ok_or_else(|| {
            AnnexError::Config("database has no recorded user extra partition count".to_string())
        })?;
    let source = Partitioner::new(from)?;

    let mut rows = Vec::new();
    let mut origin = Vec::new();
    for (index, table) in source.tables().enumerate() {
        let mut stmt = tx
            .prepare(&format!(
                "SELECT uid, message_id, message_seq, channel_id, channel_type,
                        message_is_deleted, voice_readed, created_at, updated_at
                 FROM {table}"
            ))
            .map_err(storage_err)?;
        let read = stmt
            .query_map([], |row| {
                Ok(ShardRow {
                    uid: row.get(0)?,
                    message_id: row.get(1)?,
                    message_seq: row.get(2)?,
                    channel_id: row.get(3)?,
                    channel_type: row.get(4)?,
                    message_is_deleted: row.get(5)?,
                    voice_readed: row.get(6)?,
                    created_at: row.get(7)?,
                    updated_at: row.get(8)?,
                })
            })
            .map_err(storage_err)?;
        for row in read {
            rows.push(row.map_err(storage_err)?);
            origin.push(index as u32);
        }
    }

    for (index, table) in source.tables().enumerate() {
        let sql = if (index as u32) < target.count() {
            format!("DELETE FROM {table}")
        } else {
            format!("DROP TABLE {table}")
        };
        tx.execute_batch(&sql).map_err(storage_err)?;
    }
    for table in target.tables() {
        tx.execute_batch(&partition::create_table_sql(&table))
            .map_err(storage_err)?;
    }

    let mut moved = 0;
    for (row, from_index) in rows.iter().zip(origin) {
        let to_index = target.index(&row.uid);
        if to_index != from_index {
            moved += 1;
        }
        tx.execute(
            &format!(
                "INSERT INTO {} (uid, message_id, message_seq, channel_id, channel_type,
                     message_is_deleted, voice_readed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                partition::table_name(to_index)
            ),
            params![
                row.uid,
                row.message_id,
                row.message_seq,
                row.channel_id,
                row.channel_type,
                row.message_is_deleted,
                row.voice_readed,
                row.created_at,
                row.updated_at,
            ],
        )
        .map_err(storage_err)?;
    }

    partition::store_count(&tx, target.count()).map_err(storage_err)?;
    tx.commit().map_err(storage_err)?;

    let report = RepartitionReport {
        from,
        to: target.count(),
        rows: rows.len(),
        moved,
    };
    info!(from = report.from, to = report.to, rows = report.rows, moved = report.moved, "repartition complete");
    Ok(report)
}
