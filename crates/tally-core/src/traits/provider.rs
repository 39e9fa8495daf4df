// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolver for the host's currently active model and request source.

use crate::types::{ModelId, SourceId};

/// Reports which model and provider backend the host would use for the next
/// request. Captured synchronously at prompt time so a later provider switch
/// cannot misattribute an in-flight exchange.
pub trait ActiveProvider: Send + Sync {
    /// Identifier of the active model.
    fn model_id(&self) -> ModelId;

    /// Identifier of the active request source.
    fn source_id(&self) -> SourceId;
}
