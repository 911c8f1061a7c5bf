// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface of the Annex metadata overlay.
//!
//! JSON-over-HTTP routes for conversation sync, extra sync, channel sync and
//! the per-message commands, served by axum with CORS and request tracing.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, router, start_server};
