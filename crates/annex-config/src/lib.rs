// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Annex metadata overlay.
//!
//! Layered TOML files with `ANNEX_` environment overrides, strict key checking
//! and miette diagnostics that point at the offending key.
//!
//! ```no_run
//! let config = annex_config::load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{AnnexConfig, CursorBackend};

type Sources = Vec<(String, String)>;

/// Load configuration from the standard search paths and validate it.
pub fn load_and_validate() -> Result<AnnexConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || {
        loader::search_paths()
            .iter()
            .rev()
            .filter_map(|path| read_source(path))
            .collect()
    })
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<AnnexConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<AnnexConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Runs validation on a loaded config, or turns a Figment error into
/// diagnostics. Sources are only read when there is an error to locate.
fn checked(
    loaded: Result<AnnexConfig, figment::Error>,
    sources: impl FnOnce() -> Sources,
) -> Result<AnnexConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

fn read_source(path: &Path) -> Option<(String, String)> {
    let content = std::fs::read_to_string(path).ok()?;
    let shown = if path.is_relative() {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    } else {
        path.to_path_buf()
    };
    Some((shown.display().to_string(), content))
}
