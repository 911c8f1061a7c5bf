// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user extra store, spread across the partitioned shard tables.
//!
//! Every function resolves the shard from the row's uid through
//! [`crate::partition::Partitioner`]; SQL only ever sees a concrete table name.

use annex_core::{AnnexError, UserExtra};
use rusqlite::{params, params_from_iter, types::Value};
use tracing::debug;

use crate::database::{Database, map_tr_err, now_timestamp};
use crate::queries::{MAX_BATCH, placeholders};

/// Which mutable column an upsert is allowed to touch on conflict.
#[derive(Debug, Clone, Copy)]
enum Flag {
    Deleted,
    VoiceReaded,
}

impl Flag {
    fn column(self) -> &'static str {
        match self {
            Self::Deleted => "message_is_deleted",
            Self::VoiceReaded => "voice_readed",
        }
    }
}

/// Plain insert. Fails with `Conflict` if the user already has a row for the message.
pub async fn insert(db: &Database, row: &UserExtra) -> Result<(), AnnexError> {
    let table = db.partitioner().table_for(&row.uid);
    let r = row.clone();
    let now = now_timestamp();
    let inserted = db
        .connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (uid, message_id, message_seq, channel_id, channel_type,
                         message_is_deleted, voice_readed, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                     ON CONFLICT(uid, message_id) DO NOTHING"
                ),
                params![
                    r.uid,
                    r.message_id,
                    r.message_seq,
                    r.channel_id,
                    r.channel_type,
                    r.message_is_deleted,
                    r.voice_readed,
                    now,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if inserted == 0 {
        return Err(AnnexError::Conflict {
            entity: "user extra",
            id: format!("{}/{}", row.uid, row.message_id),
        });
    }
    Ok(())
}

/// Idempotent upsert; on conflict only `message_is_deleted` changes.
pub async fn upsert_deleted(db: &Database, row: &UserExtra) -> Result<(), AnnexError> {
    upsert_flag(db, row, Flag::Deleted).await
}

/// Idempotent upsert; on conflict only `voice_readed` changes.
pub async fn upsert_voice_readed(db: &Database, row: &UserExtra) -> Result<(), AnnexError> {
    upsert_flag(db, row, Flag::VoiceReaded).await
}

async fn upsert_flag(db: &Database, row: &UserExtra, flag: Flag) -> Result<(), AnnexError> {
    let table = db.partitioner().table_for(&row.uid);
    let column = flag.column();
    let r = row.clone();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (uid, message_id, message_seq, channel_id, channel_type,
                         message_is_deleted, voice_readed, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                     ON CONFLICT(uid, message_id) DO UPDATE
                     SET {column} = excluded.{column}, updated_at = excluded.updated_at"
                ),
                params![
                    r.uid,
                    r.message_id,
                    r.message_seq,
                    r.channel_id,
                    r.channel_type,
                    r.message_is_deleted,
                    r.voice_readed,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    debug!(uid = %row.uid, message_id = %row.message_id, column, "user extra upserted");
    Ok(())
}

/// The user's rows for the given messages, read from the user's shard only.
pub async fn get_for_user(
    db: &Database,
    uid: &str,
    message_ids: &[String],
) -> Result<Vec<UserExtra>, AnnexError> {
    if message_ids.is_empty() {
        return Ok(Vec::new());
    }
    let table = db.partitioner().table_for(uid);
    let uid = uid.to_string();
    let ids = message_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut found = Vec::new();
            for chunk in ids.chunks(MAX_BATCH) {
                let sql = format!(
                    "SELECT uid, message_id, message_seq, channel_id, channel_type,
                            message_is_deleted, voice_readed
                     FROM {table} WHERE uid = ?1 AND message_id IN ({})",
                    placeholders(2, chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let values = std::iter::once(Value::from(uid.clone()))
                    .chain(chunk.iter().cloned().map(Value::from));
                let rows = stmt.query_map(params_from_iter(values), |row| {
                    Ok(UserExtra {
                        uid: row.get(0)?,
                        message_id: row.get(1)?,
                        message_seq: row.get(2)?,
                        channel_id: row.get(3)?,
                        channel_type: row.get(4)?,
                        message_is_deleted: row.get(5)?,
                        voice_readed: row.get(6)?,
                    })
                })?;
                for row in rows {
                    found.push(row?);
                }
            }
            Ok(found)
        })
        .await
        .map_err(map_tr_err)
}
