// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time handling for the Tally usage meter.
//!
//! Provides:
//! - **TimeSource**: the single clock used for every ledger write, optionally
//!   corrected by an external reference
//! - **Reference resync**: a periodic, non-blocking background task
//! - **Bucket keys**: UTC day/hour/ISO-week/month key computation

pub mod buckets;
pub mod reference;
pub mod time_source;

pub use buckets::{day_key, hour_key, month_key, week_key};
pub use reference::{resync_once, spawn_resync, HttpReferenceClock, ReferenceClock};
pub use time_source::TimeSource;
