// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence trait for the host's versioned settings blob.

use async_trait::async_trait;

use crate::error::TallyError;

/// A generic versioned key-value settings blob supplied by the host.
///
/// The meter owns the shape of the blob (see [`crate::model::MeterSettings`]);
/// the host only stores and returns it opaquely.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the previously saved blob, or `None` on first run.
    async fn load(&self) -> Result<Option<serde_json::Value>, TallyError>;

    /// Persist the blob, replacing any previous value.
    async fn save(&self, blob: &serde_json::Value) -> Result<(), TallyError>;
}
