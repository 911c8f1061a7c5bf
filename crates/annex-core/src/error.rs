// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Annex metadata overlay.

use thiserror::Error;

/// The primary error type used across all Annex adapter traits and core operations.
#[derive(Debug, Error)]
pub enum AnnexError {
    /// Configuration errors (invalid TOML, bad partition count, missing fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A required request field is missing or malformed.
    ///
    /// Raised before any store access, so it never has side effects.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced entity is absent where presence was required.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A create-only write hit an existing key.
    #[error("{entity} already exists: {id}")]
    Conflict { entity: &'static str, id: String },

    /// The external message store returned a failure. Never retried.
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnnexError {
    /// Shorthand for an upstream failure without an underlying source error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when the caller, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Conflict { .. }
        )
    }
}
