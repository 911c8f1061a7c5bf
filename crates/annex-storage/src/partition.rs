// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-extra shard resolution.
//!
//! A user's rows live in exactly one physical table, chosen by
//! `crc32(uid) mod N`. Index 0 is `message_user_extra`; index `i > 0` is
//! `message_user_extra{i}`. The mapping is pure so every caller agrees on it.

use annex_core::AnnexError;
use rusqlite::{OptionalExtension, params};

/// Name of shard 0, and the prefix of every other shard.
pub const BASE_TABLE: &str = "message_user_extra";

const META_KEY: &str = "user_extra_table_count";

/// Maps uids onto a fixed number of shard tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    count: u32,
}

impl Partitioner {
    /// `count` must be at least 1.
    pub fn new(count: u32) -> Result<Self, AnnexError> {
        if count == 0 {
            return Err(AnnexError::Config(
                "user extra table count must be at least 1".to_string(),
            ));
        }
        Ok(Self { count })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn index(&self, uid: &str) -> u32 {
        crc32fast::hash(uid.as_bytes()) % self.count
    }

    /// Physical table holding `uid`'s rows.
    pub fn table_for(&self, uid: &str) -> String {
        table_name(self.index(uid))
    }

    pub fn tables(&self) -> impl Iterator<Item = String> {
        (0..self.count).map(table_name)
    }
}

pub fn table_name(index: u32) -> String {
    if index == 0 {
        BASE_TABLE.to_string()
    } else {
        format!("{BASE_TABLE}{index}")
    }
}

pub(crate) fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            uid                TEXT NOT NULL,
            message_id         TEXT NOT NULL,
            message_seq        INTEGER NOT NULL DEFAULT 0,
            channel_id         TEXT NOT NULL DEFAULT '',
            channel_type       INTEGER NOT NULL DEFAULT 0,
            message_is_deleted INTEGER NOT NULL DEFAULT 0,
            voice_readed       INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL,
            PRIMARY KEY (uid, message_id)
        );"
    )
}

/// Shard count recorded in the database, if any.
pub(crate) fn stored_count(conn: &rusqlite::Connection) -> rusqlite::Result<Option<u32>> {
    conn.query_row(
        "SELECT value FROM partition_meta WHERE key = ?1",
        params![META_KEY],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn store_count(conn: &rusqlite::Connection, count: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO partition_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![META_KEY, count],
    )?;
    Ok(())
}

/// Records the shard count on first open and creates every shard table.
///
/// A database created with a different count is refused; the count only
/// changes through [`crate::repartition`].
pub(crate) fn ensure_layout(
    conn: &rusqlite::Connection,
    configured: Partitioner,
) -> Result<(), AnnexError> {
    let storage_err = |e: rusqlite::Error| AnnexError::Storage {
        source: Box::new(e),
    };

    match stored_count(conn).map_err(storage_err)? {
        Some(stored) if stored != configured.count() => {
            return Err(AnnexError::Config(format!(
                "database has {stored} user extra tables but {} are configured; \
                 run `annex repartition --count {}` to migrate",
                configured.count(),
                configured.count()
            )));
        }
        Some(_) => {}
        None => {
            store_count(conn, configured.count()).map_err(storage_err)?;
            tracing::info!(count = configured.count(), "recorded user extra partition count");
        }
    }

    for table in configured.tables() {
        conn.execute_batch(&create_table_sql(&table))
            .map_err(storage_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_count_is_rejected() {
        assert!(matches!(Partitioner::new(0), Err(AnnexError::Config(_))));
    }

    #[test]
    fn index_zero_uses_base_table() {
        assert_eq!(table_name(0), "message_user_extra");
        assert_eq!(table_name(3), "message_user_extra3");
    }

    #[test]
    fn single_partition_maps_everyone_to_base_table() {
        let p = Partitioner::new(1).unwrap();
        assert_eq!(p.table_for("u1"), BASE_TABLE);
        assert_eq!(p.table_for("someone-else"), BASE_TABLE);
    }

    #[test]
    fn index_matches_crc32_ieee() {
        // crc32("u1") = 0x424F9F76
        let p = Partitioner::new(5).unwrap();
        assert_eq!(crc32fast::hash(b"u1"), 0x424F_9F76);
        assert_eq!(p.index("u1"), 0x424F_9F76 % 5);
    }

    #[test]
    fn tables_lists_every_shard() {
        let p = Partitioner::new(3).unwrap();
        let tables: Vec<_> = p.tables().collect();
        assert_eq!(
            tables,
            vec!["message_user_extra", "message_user_extra1", "message_user_extra2"]
        );
    }

    #[test]
    fn layout_records_count_and_refuses_mismatch() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE partition_meta (key TEXT PRIMARY KEY, value INTEGER NOT NULL);")
            .unwrap();
        ensure_layout(&conn, Partitioner::new(3).unwrap()).unwrap();
        assert_eq!(stored_count(&conn).unwrap(), Some(3));
        // Reopening with the same count is fine.
        ensure_layout(&conn, Partitioner::new(3).unwrap()).unwrap();

        let err = ensure_layout(&conn, Partitioner::new(4).unwrap()).unwrap_err();
        assert!(matches!(err, AnnexError::Config(_)));
    }

    proptest! {
        #[test]
        fn index_is_deterministic_and_in_range(uid in ".{0,32}", count in 1u32..64) {
            let p = Partitioner::new(count).unwrap();
            let first = p.index(&uid);
            prop_assert!(first < count);
            prop_assert_eq!(first, p.index(&uid));
            prop_assert_eq!(p.table_for(&uid), table_name(first));
        }
    }
}
