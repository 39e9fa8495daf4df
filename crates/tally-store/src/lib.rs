// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage ledger for the Tally meter.
//!
//! This crate provides:
//! - **UsageStore**: the single mutation entry point over every aggregate
//!   dimension (session, all-time, day/hour/week/month, chat/model/source),
//!   with atomic multi-bucket updates, persistence through the host
//!   settings-store seam, and a typed change broadcast
//! - **JsonSettingsStore**: file-backed settings blob for the CLI and tests
//! - **Import/export**: versioned snapshot files with additive or
//!   replace-on-conflict merge

pub mod merge;
pub mod persist;
pub mod snapshot;
pub mod store;

pub use merge::{export, export_to_json, import_json, ExportFile, ImportSummary, EXPORT_VERSION};
pub use persist::JsonSettingsStore;
pub use snapshot::StatsSnapshot;
pub use store::{UsageRecord, UsageStore};
