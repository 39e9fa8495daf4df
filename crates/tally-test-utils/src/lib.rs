// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Tally workspace.
//!
//! Provides mock implementations of every host-service seam plus a
//! [`TestHarness`] that assembles a working meter stack for integration
//! tests.

pub mod harness;
pub mod mock_counter;
pub mod mock_provider;
pub mod mock_transcript;

pub use harness::{MemorySettingsStore, TestHarness, TestHarnessBuilder};
pub use mock_counter::MockTokenCounter;
pub use mock_provider::{ManualReferenceClock, MockProvider};
pub use mock_transcript::MockTranscript;
