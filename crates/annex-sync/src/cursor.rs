// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local version cursor cache.

use std::hash::Hash;

use async_trait::async_trait;
use dashmap::DashMap;

use annex_core::{AnnexError, VersionCursorCache};

/// In-memory [`VersionCursorCache`] backed by sharded maps.
///
/// Contents are lost on restart; use it for single-node deployments that can
/// tolerate clients re-pulling from their own version.
#[derive(Debug, Default)]
pub struct MemoryCursorCache {
    devices: DashMap<(String, String), i64>,
    users: DashMap<String, i64>,
    extras: DashMap<(String, String, String), i64>,
}

impl MemoryCursorCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn raise<K: Eq + Hash>(map: &DashMap<K, i64>, key: K, version: i64) {
    let mut entry = map.entry(key).or_insert(version);
    *entry = (*entry).max(version);
}

#[async_trait]
impl VersionCursorCache for MemoryCursorCache {
    async fn device_version(&self, uid: &str, device_id: &str) -> Result<i64, AnnexError> {
        let key = (uid.to_string(), device_id.to_string());
        Ok(self.devices.get(&key).map_or(0, |v| *v))
    }

    async fn set_device_version(
        &self,
        uid: &str,
        device_id: &str,
        version: i64,
    ) -> Result<(), AnnexError> {
        raise(&self.devices, (uid.to_string(), device_id.to_string()), version);
        Ok(())
    }

    async fn user_version(&self, uid: &str) -> Result<i64, AnnexError> {
        Ok(self.users.get(uid).map_or(0, |v| *v))
    }

    async fn set_user_version(&self, uid: &str, version: i64) -> Result<(), AnnexError> {
        raise(&self.users, uid.to_string(), version);
        Ok(())
    }

    async fn extra_version(
        &self,
        uid: &str,
        source: &str,
        channel_key: &str,
    ) -> Result<i64, AnnexError> {
        let key = (uid.to_string(), source.to_string(), channel_key.to_string());
        Ok(self.extras.get(&key).map_or(0, |v| *v))
    }

    async fn set_extra_version(
        &self,
        uid: &str,
        source: &str,
        channel_key: &str,
        version: i64,
    ) -> Result<(), AnnexError> {
        raise(
            &self.extras,
            (uid.to_string(), source.to_string(), channel_key.to_string()),
            version,
        );
        Ok(())
    }
}
