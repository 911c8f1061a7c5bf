// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary and applied on
//! every open; refinery records what already ran in `refinery_schema_history`.

use annex_core::AnnexError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies all pending migrations.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), AnnexError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| AnnexError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        tracing::info!(name = %migration.name(), version = migration.version(), "applied migration");
    }
    Ok(())
}
