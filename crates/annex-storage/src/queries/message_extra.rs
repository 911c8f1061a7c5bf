// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Global extra store: one row of viewer-independent metadata per message.

use annex_core::{AnnexError, ChannelKey, GlobalExtra};
use rusqlite::{OptionalExtension, params, params_from_iter};
use tracing::debug;

use crate::database::{Database, map_tr_err, now_timestamp};
use crate::queries::{MAX_BATCH, placeholders};

const COLUMNS: &str = "message_id, message_seq, channel_id, channel_type, from_uid, revoke, \
                       revoker, clone_no, readed_count, content_edit, content_edit_hash, \
                       edited_at, is_deleted, version";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GlobalExtra> {
    Ok(GlobalExtra {
        message_id: row.get(0)?,
        message_seq: row.get(1)?,
        channel_id: row.get(2)?,
        channel_type: row.get(3)?,
        from_uid: row.get(4)?,
        revoke: row.get(5)?,
        revoker: row.get(6)?,
        clone_no: row.get(7)?,
        readed_count: row.get(8)?,
        content_edit: row.get(9)?,
        content_edit_hash: row.get(10)?,
        edited_at: row.get(11)?,
        is_deleted: row.get(12)?,
        version: row.get(13)?,
    })
}

/// Create-only insert. Fails with `Conflict` when the message id exists.
pub async fn insert(db: &Database, extra: &GlobalExtra) -> Result<(), AnnexError> {
    let e = extra.clone();
    let now = now_timestamp();
    let inserted = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO message_extra (message_id, message_seq, channel_id, channel_type,
                     from_uid, revoke, revoker, clone_no, readed_count, content_edit,
                     content_edit_hash, edited_at, is_deleted, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
                 ON CONFLICT(message_id) DO NOTHING",
                params![
                    e.message_id,
                    e.message_seq,
                    e.channel_id,
                    e.channel_type,
                    e.from_uid,
                    e.revoke,
                    e.revoker,
                    e.clone_no,
                    e.readed_count,
                    e.content_edit,
                    e.content_edit_hash,
                    e.edited_at,
                    e.is_deleted,
                    e.version,
                    now,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if inserted == 0 {
        return Err(AnnexError::Conflict {
            entity: "message extra",
            id: extra.message_id.clone(),
        });
    }
    debug!(message_id = %extra.message_id, version = extra.version, "message extra inserted");
    Ok(())
}

/// Overwrites the mutable columns of an existing row. Fails with `NotFound`
/// when the row is absent.
///
/// The stored version always moves forward. A writer whose version is not
/// above the stored one gets `stored + 1`, so clients already at the stored
/// version still see the change.
pub async fn update(db: &Database, extra: &GlobalExtra) -> Result<(), AnnexError> {
    let e = extra.clone();
    let now = now_timestamp();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE message_extra
                 SET readed_count = ?2, version = MAX(version + 1, ?3), revoke = ?4, revoker = ?5,
                     content_edit = ?6, content_edit_hash = ?7, edited_at = ?8, updated_at = ?9
                 WHERE message_id = ?1",
                params![
                    e.message_id,
                    e.readed_count,
                    e.version,
                    e.revoke,
                    e.revoker,
                    e.content_edit,
                    e.content_edit_hash,
                    e.edited_at,
                    now,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if updated == 0 {
        return Err(AnnexError::NotFound {
            entity: "message extra",
            id: extra.message_id.clone(),
        });
    }
    debug!(message_id = %extra.message_id, version = extra.version, "message extra updated");
    Ok(())
}

pub async fn get(db: &Database, message_id: &str) -> Result<Option<GlobalExtra>, AnnexError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM message_extra WHERE message_id = ?1"),
                params![message_id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Batch lookup by message id. Order of the result is unspecified.
pub async fn get_many(db: &Database, message_ids: &[String]) -> Result<Vec<GlobalExtra>, AnnexError> {
    if message_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids = message_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut found = Vec::new();
            for chunk in ids.chunks(MAX_BATCH) {
                let sql = format!(
                    "SELECT {COLUMNS} FROM message_extra WHERE message_id IN ({})",
                    placeholders(1, chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), from_row)?;
                for row in rows {
                    found.push(row?);
                }
            }
            Ok(found)
        })
        .await
        .map_err(map_tr_err)
}

/// Rows of `channel` changed after `version`, in ascending version order.
///
/// A version of 0 bootstraps a fresh client with the latest `limit` rows
/// instead of the oldest ones.
pub async fn sync(
    db: &Database,
    version: i64,
    channel: &ChannelKey,
    limit: u32,
) -> Result<Vec<GlobalExtra>, AnnexError> {
    let channel = channel.clone();
    db.connection()
        .call(move |conn| {
            let mut out = Vec::new();
            if version == 0 {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM message_extra
                     WHERE channel_id = ?1 AND channel_type = ?2
                     ORDER BY version DESC LIMIT ?3"
                ))?;
                let rows = stmt.query_map(
                    params![channel.channel_id, channel.channel_type, limit],
                    from_row,
                )?;
                for row in rows {
                    out.push(row?);
                }
                out.reverse();
            } else {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM message_extra
                     WHERE channel_id = ?1 AND channel_type = ?2 AND version > ?3
                     ORDER BY version ASC LIMIT ?4"
                ))?;
                let rows = stmt.query_map(
                    params![channel.channel_id, channel.channel_type, version, limit],
                    from_row,
                )?;
                for row in rows {
                    out.push(row?);
                }
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}
