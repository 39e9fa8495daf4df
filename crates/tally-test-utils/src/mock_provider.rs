// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock active-provider resolver and reference clock.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_clock::ReferenceClock;
use tally_core::{ActiveProvider, ModelId, SourceId, TallyError};

/// Provider resolver returning scriptable model/source ids.
pub struct MockProvider {
    model: Mutex<ModelId>,
    source: Mutex<SourceId>,
}

impl MockProvider {
    pub fn new(model: &str, source: &str) -> Self {
        Self {
            model: Mutex::new(ModelId::from(model)),
            source: Mutex::new(SourceId::from(source)),
        }
    }

    pub fn set_model(&self, model: &str) {
        *self.model.lock().unwrap_or_else(|e| e.into_inner()) = ModelId::from(model);
    }

    pub fn set_source(&self, source: &str) {
        *self.source.lock().unwrap_or_else(|e| e.into_inner()) = SourceId::from(source);
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("mock/model", "openrouter")
    }
}

impl ActiveProvider for MockProvider {
    fn model_id(&self) -> ModelId {
        self.model.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn source_id(&self) -> SourceId {
        self.source.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Reference clock returning a scripted time.
pub struct ManualReferenceClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualReferenceClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

#[async_trait]
impl ReferenceClock for ManualReferenceClock {
    async fn fetch_now(&self) -> Result<DateTime<Utc>, TallyError> {
        Ok(*self.now.lock().unwrap_or_else(|e| e.into_inner()))
    }
}
