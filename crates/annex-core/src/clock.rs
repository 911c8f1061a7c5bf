// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monotonic source of extra versions.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hands out strictly increasing versions derived from the wall clock.
///
/// Each version is the current unix time in milliseconds, bumped to
/// `previous + 1` when the clock has not advanced (or went backwards).
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicI64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next version.
    pub fn next(&self) -> i64 {
        let now = now_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Current unix time in seconds.
pub fn now_secs() -> i64 {
    now_millis() / 1000
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
