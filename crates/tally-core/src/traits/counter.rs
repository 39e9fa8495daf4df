// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token counter trait for the host tokenizer service.

use async_trait::async_trait;

use crate::error::TallyError;

/// Asynchronous token counter supplied by the host.
///
/// Counting is always invoked through this async path, never a synchronous
/// one, so a slow tokenizer can never block event dispatch. Callers that
/// must not fail go through [`crate::counting::count_with_fallback`].
#[async_trait]
pub trait TokenCounter: Send + Sync {
    /// Count the tokens in `text` for the currently active model.
    async fn count_tokens(&self, text: &str) -> Result<u64, TallyError>;
}
