// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::AnnexConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates semantic constraints serde cannot express.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &AnnexConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "server.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.server.log_level
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.storage.user_extra_table_count < 1 {
        errors.push(ConfigError::validation(
            "storage.user_extra_table_count must be at least 1",
        ));
    }

    let url = config.upstream.api_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "upstream.api_url `{url}` must start with http:// or https://"
        )));
    }

    if config.upstream.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "upstream.timeout_secs must be greater than 0",
        ));
    }

    let sync = &config.sync;
    if sync.extra_sync_default_limit == 0 {
        errors.push(ConfigError::validation(
            "sync.extra_sync_default_limit must be greater than 0",
        ));
    }
    if sync.extra_sync_default_limit > sync.extra_sync_max_limit {
        errors.push(ConfigError::validation(format!(
            "sync.extra_sync_default_limit ({}) must not exceed sync.extra_sync_max_limit ({})",
            sync.extra_sync_default_limit, sync.extra_sync_max_limit
        )));
    }
    if sync.default_msg_count <= 0 {
        errors.push(ConfigError::validation(format!(
            "sync.default_msg_count must be positive, got {}",
            sync.default_msg_count
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
