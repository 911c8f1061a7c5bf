// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel read-offset store.
//!
//! A row with an empty uid is the floor shared by every member of the
//! channel. The effective offset of a user is the larger of their own row
//! and the floor.

use std::collections::HashMap;

use annex_core::{AnnexError, ChannelKey, ChannelOffset};
use rusqlite::{params, params_from_iter, types::Value};
use tracing::debug;

use crate::database::{Database, map_tr_err, now_timestamp};
use crate::queries::{MAX_BATCH, placeholders};

/// Raises the stored offset to `offset.message_seq`; never lowers it.
pub async fn raise(db: &Database, offset: &ChannelOffset) -> Result<(), AnnexError> {
    let o = offset.clone();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channel_offset (uid, channel_id, channel_type, message_seq,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(uid, channel_id, channel_type) DO UPDATE
                 SET message_seq = MAX(message_seq, excluded.message_seq),
                     updated_at = excluded.updated_at",
                params![o.uid, o.channel_id, o.channel_type, o.message_seq, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    debug!(
        uid = %offset.uid,
        channel_id = %offset.channel_id,
        message_seq = offset.message_seq,
        "channel offset raised"
    );
    Ok(())
}

/// Effective offset of `uid` in one channel; 0 when neither row exists.
pub async fn effective(db: &Database, uid: &str, channel: &ChannelKey) -> Result<u32, AnnexError> {
    let uid = uid.to_string();
    let channel = channel.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(MAX(message_seq), 0) FROM channel_offset
                 WHERE (uid = ?1 OR uid = '') AND channel_id = ?2 AND channel_type = ?3",
                params![uid, channel.channel_id, channel.channel_type],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Effective offsets of `uid` across many channel ids, one grouped query per
/// chunk. Channels without any row are absent from the map.
pub async fn effective_many(
    db: &Database,
    uid: &str,
    channel_ids: &[String],
) -> Result<HashMap<ChannelKey, u32>, AnnexError> {
    if channel_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let uid = uid.to_string();
    let ids = channel_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut offsets = HashMap::new();
            for chunk in ids.chunks(MAX_BATCH) {
                let sql = format!(
                    "SELECT channel_id, channel_type, MAX(message_seq) FROM channel_offset
                     WHERE (uid = ?1 OR uid = '') AND channel_id IN ({})
                     GROUP BY channel_id, channel_type",
                    placeholders(2, chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let values = std::iter::once(Value::from(uid.clone()))
                    .chain(chunk.iter().cloned().map(Value::from));
                let rows = stmt.query_map(params_from_iter(values), |row| {
                    Ok((
                        ChannelKey::new(row.get::<_, String>(0)?, row.get(1)?),
                        row.get::<_, u32>(2)?,
                    ))
                })?;
                for row in rows {
                    let (key, seq) = row?;
                    offsets.insert(key, seq);
                }
            }
            Ok(offsets)
        })
        .await
        .map_err(map_tr_err)
}
