// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness assembling the meter stack with mock host services.
//!
//! `TestHarness` wires a fixed [`TimeSource`], an in-memory settings store,
//! and the [`UsageStore`] together with scriptable mocks for the counter,
//! transcript, and provider. Trackers are constructed on top by the tests
//! that need one.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tally_clock::TimeSource;
use tally_core::{MeterSettings, SettingsStore, TallyError};
use tally_store::UsageStore;

use crate::mock_counter::MockTokenCounter;
use crate::mock_provider::MockProvider;
use crate::mock_transcript::MockTranscript;

/// In-memory settings store with optional failure injection.
#[derive(Default)]
pub struct MemorySettingsStore {
    blob: Mutex<Option<serde_json::Value>>,
    fail_saves: Mutex<bool>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail.
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// The currently persisted blob, if any.
    pub fn persisted(&self) -> Option<serde_json::Value> {
        self.blob.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Option<serde_json::Value>, TallyError> {
        Ok(self.blob.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn save(&self, blob: &serde_json::Value) -> Result<(), TallyError> {
        if *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(TallyError::Storage {
                source: "injected save failure".into(),
            });
        }
        *self.blob.lock().unwrap_or_else(|e| e.into_inner()) = Some(blob.clone());
        Ok(())
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    now: DateTime<Utc>,
    settings: MeterSettings,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            now: Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
            settings: MeterSettings::default(),
        }
    }

    /// Pin the harness clock at `now`.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Start from pre-seeded settings.
    pub fn with_settings(mut self, settings: MeterSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the harness.
    pub fn build(self) -> TestHarness {
        let time = Arc::new(TimeSource::fixed(self.now));
        let persist = Arc::new(MemorySettingsStore::new());
        let store = Arc::new(UsageStore::new(
            time.clone(),
            persist.clone(),
            self.settings,
        ));

        TestHarness {
            time,
            persist,
            store,
            counter: Arc::new(MockTokenCounter::new()),
            transcript: Arc::new(MockTranscript::new()),
            provider: Arc::new(MockProvider::default()),
        }
    }
}

/// A fully wired meter stack over mock host services.
pub struct TestHarness {
    pub time: Arc<TimeSource>,
    pub persist: Arc<MemorySettingsStore>,
    pub store: Arc<UsageStore>,
    pub counter: Arc<MockTokenCounter>,
    pub transcript: Arc<MockTranscript>,
    pub provider: Arc<MockProvider>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_store::UsageRecord;

    #[tokio::test]
    async fn harness_records_through_to_memory_settings() {
        let harness = TestHarness::builder().build();
        harness
            .store
            .record(UsageRecord::new(10, 5))
            .await
            .unwrap();

        let blob = harness.persist.persisted().expect("blob persisted");
        assert_eq!(blob["usage"]["all_time"]["total"], 15);
    }

    #[tokio::test]
    async fn injected_save_failure_surfaces() {
        let harness = TestHarness::builder().build();
        harness.persist.set_fail_saves(true);
        assert!(harness.store.record(UsageRecord::new(1, 1)).await.is_err());
    }
}
