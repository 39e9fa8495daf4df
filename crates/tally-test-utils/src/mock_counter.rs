// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic mock token counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tally_core::{TallyError, TokenCounter};

/// Token counter with scripted counts and failure injection.
///
/// By default every word counts as one token, which keeps expected values
/// easy to read in tests. Specific texts can be given exact counts via
/// [`MockTokenCounter::set_count`].
#[derive(Default)]
pub struct MockTokenCounter {
    overrides: Mutex<HashMap<String, u64>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockTokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an exact count for a specific text.
    pub fn set_count(&self, text: &str, count: u64) {
        self.overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(text.to_string(), count);
    }

    /// Make every subsequent count fail (exercises the fallback path).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of count calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenCounter for MockTokenCounter {
    async fn count_tokens(&self, text: &str) -> Result<u64, TallyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TallyError::Counting {
                message: "mock counter failure".into(),
                source: None,
            });
        }
        if let Some(count) = self
            .overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(text)
        {
            return Ok(*count);
        }
        Ok(text.split_whitespace().count() as u64)
    }
}
