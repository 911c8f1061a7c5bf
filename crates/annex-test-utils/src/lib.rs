// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Annex integration tests.
//!
//! Provides a scripted IM core and a harness wiring the real sync services
//! over a temp SQLite database, so tests run without external services.
//!
//! # Components
//!
//! - [`MockMessageStore`] - IM core double with queued responses and call capture
//! - [`TestHarness`] - Full service stack over temp storage

pub mod harness;
pub mod mock_store;

pub use harness::TestHarness;
pub use mock_store::MockMessageStore;
