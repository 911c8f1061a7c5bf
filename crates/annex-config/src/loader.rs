// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./annex.toml` > `~/.config/annex/annex.toml` > `/etc/annex/annex.toml`
//! with environment variable overrides via the `ANNEX_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AnnexConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/annex/annex.toml`
/// 3. `~/.config/annex/annex.toml`
/// 4. `./annex.toml`
/// 5. `ANNEX_*` environment variables
pub fn load_config() -> Result<AnnexConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<AnnexConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AnnexConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AnnexConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AnnexConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files consulted by [`load_config`], lowest priority first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/annex/annex.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("annex/annex.toml"));
    }
    paths.push(PathBuf::from("annex.toml"));
    paths
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(AnnexConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Environment provider mapping `ANNEX_SECTION_KEY` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `ANNEX_STORAGE_USER_EXTRA_TABLE_COUNT` must become
/// `storage.user_extra_table_count`.
pub fn env_provider() -> Env {
    Env::prefixed("ANNEX_").map(|key| {
        let key_str = key.as_str();
        let mapped = map_env_key(key_str);
        mapped.into()
    })
}

fn map_env_key(key: &str) -> String {
    for section in ["server", "storage", "upstream", "sync"] {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
