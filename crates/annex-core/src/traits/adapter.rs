// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all backend adapters must implement.

use async_trait::async_trait;

use crate::error::AnnexError;
use crate::types::HealthStatus;

/// The base trait for all Annex backend adapters.
///
/// Every backend (storage, message store) implements this trait. Identity and
/// health feed `GET /health`; `shutdown` runs when the server stops.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, AnnexError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), AnnexError>;
}
