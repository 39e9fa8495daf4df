// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams to the host application.
//!
//! The meter never reimplements host functionality: token counting, the chat
//! transcript, the active provider, and settings persistence are all consumed
//! through these traits.

pub mod counter;
pub mod provider;
pub mod settings;
pub mod transcript;

pub use counter::TokenCounter;
pub use provider::ActiveProvider;
pub use settings::SettingsStore;
pub use transcript::{TranscriptAccessor, TranscriptMessage};
