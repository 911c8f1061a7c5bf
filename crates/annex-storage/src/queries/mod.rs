// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions, one module per overlay store.

pub mod channel_offset;
pub mod message_extra;
pub mod user_extra;

/// Ids per `IN (...)` list, kept well under SQLite's bound-parameter limit.
pub(crate) const MAX_BATCH: usize = 500;

/// `?{start},?{start+1},...` for `len` parameters.
pub(crate) fn placeholders(start: usize, len: usize) -> String {
    (start..start + len)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(",")
}
