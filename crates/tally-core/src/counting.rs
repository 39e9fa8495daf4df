// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counting helpers with the character-length fallback.
//!
//! Counting failures are recovered locally and never propagated: at worst an
//! exchange is estimated rather than exactly counted.

use tracing::warn;

use crate::traits::TokenCounter;

/// Average characters per token used by the fallback estimate.
pub const FALLBACK_CHARS_PER_TOKEN: f64 = 3.35;

/// Character-length token estimate: `ceil(chars / 3.35)`.
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() as f64 / FALLBACK_CHARS_PER_TOKEN).ceil() as u64
}

/// Count tokens through the host counter, falling back to the character
/// estimate when the counter fails.
pub async fn count_with_fallback(counter: &dyn TokenCounter, text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    match counter.count_tokens(text).await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, chars = text.chars().count(), "token counter failed, using character estimate");
            estimate_tokens(text)
        }
    }
}
