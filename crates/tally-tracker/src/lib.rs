// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation-lifecycle tracking for the Tally usage meter.
//!
//! The [`LifecycleTracker`] consumes host lifecycle events, coordinates the
//! concurrent async counting tasks each exchange spawns, and emits exactly
//! one usage record per completed (or flushed) generation into the store:
//! - **Exclusive context ownership**: one in-flight generation context at a
//!   time; a new start abandons the old one explicitly
//! - **Structural joins**: finalization awaits the prompt count and the
//!   continue baseline rather than assuming either finished first
//! - **Quiet path**: background calls are instrumented through a guarded
//!   mini-protocol that records once per outermost call

mod context;
pub mod quiet;
pub mod tracker;

pub use tracker::{LifecycleTracker, TrackerPhase};
