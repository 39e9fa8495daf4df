// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background/quiet call instrumentation.
//!
//! Direct request/response calls made by other subsystems bypass the normal
//! message-received path. They follow a parallel mini-protocol: count the
//! input before issuing the call, invoke it, count the output from its
//! return value, record once. A single process-wide flag prevents nested
//! instrumented calls from double-counting; it is released by a drop guard
//! so an erroring call can never leave the tracker permanently stuck.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tally_core::counting::count_with_fallback;
use tally_core::TallyError;
use tally_store::UsageRecord;
use tracing::{debug, error};

use crate::tracker::LifecycleTracker;

/// Releases the recursion flag when the tracking scope ends, error or not.
struct TrackingGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl LifecycleTracker {
    /// Instrument one background call.
    ///
    /// `call` performs the actual request and yields the response text. When
    /// another instrumented call is already being tracked on this tracker,
    /// the inner call passes through unrecorded; the outermost scope records
    /// exactly once.
    pub async fn track_quiet<F, Fut>(&self, prompt: &str, call: F) -> Result<String, TallyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, TallyError>>,
    {
        if self.quiet_flag.swap(true, Ordering::SeqCst) {
            debug!("nested background call, passing through unrecorded");
            return call().await;
        }
        let _guard = TrackingGuard {
            flag: Arc::clone(&self.quiet_flag),
        };

        let input = count_with_fallback(self.counter.as_ref(), prompt).await;
        let result = call().await;

        if let Ok(text) = &result {
            let output = count_with_fallback(self.counter.as_ref(), text).await;
            let mut record = UsageRecord::new(input, output)
                .with_model(self.provider.model_id())
                .with_source(self.provider.source_id());
            if let Some(chat) = self.transcript.active_chat() {
                record = record.with_chat(chat);
            }
            if let Err(e) = self.store.record(record).await {
                error!(error = %e, "failed to record background call");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tally_test_utils::TestHarness;

    fn tracker_for(harness: &TestHarness) -> Arc<LifecycleTracker> {
        Arc::new(LifecycleTracker::new(
            harness.store.clone(),
            harness.counter.clone(),
            harness.transcript.clone(),
            harness.provider.clone(),
        ))
    }

    #[tokio::test]
    async fn quiet_call_records_input_and_output() {
        let harness = TestHarness::builder().build();
        harness.counter.set_count("quiet prompt", 200);
        harness.counter.set_count("quiet response", 60);

        let tracker = tracker_for(&harness);
        let response = tracker
            .track_quiet("quiet prompt", || async {
                Ok("quiet response".to_string())
            })
            .await
            .unwrap();
        assert_eq!(response, "quiet response");

        let snap = harness.store.snapshot().await;
        assert_eq!(snap.all_time.input, 200);
        assert_eq!(snap.all_time.output, 60);
        assert_eq!(snap.all_time.message_count, 1);
        assert_eq!(snap.by_source["openrouter"].total, 260);
    }

    #[tokio::test]
    async fn nested_quiet_calls_record_exactly_once() {
        let harness = TestHarness::builder().build();
        harness.counter.set_count("outer prompt", 100);
        harness.counter.set_count("inner prompt", 1_000);
        harness.counter.set_count("outer response", 10);

        let tracker = tracker_for(&harness);
        let inner = tracker.clone();
        tracker
            .track_quiet("outer prompt", || async move {
                // An instrumented subsystem internally invoking another one.
                inner
                    .track_quiet("inner prompt", || async {
                        Ok("inner response".to_string())
                    })
                    .await?;
                Ok("outer response".to_string())
            })
            .await
            .unwrap();

        let snap = harness.store.snapshot().await;
        assert_eq!(snap.all_time.message_count, 1, "inner call not double-counted");
        assert_eq!(snap.all_time.input, 100);
        assert_eq!(snap.all_time.output, 10);
    }

    #[tokio::test]
    async fn erroring_call_releases_the_guard() {
        let harness = TestHarness::builder().build();
        harness.counter.set_count("p1", 10);
        harness.counter.set_count("p2", 20);
        harness.counter.set_count("ok", 5);

        let tracker = tracker_for(&harness);
        let failed = tracker
            .track_quiet("p1", || async {
                Err(TallyError::Internal("provider down".into()))
            })
            .await;
        assert!(failed.is_err());
        assert_eq!(
            harness.store.snapshot().await.all_time.message_count,
            0,
            "failed call is not recorded"
        );

        // The guard was released: the next call records normally.
        tracker
            .track_quiet("p2", || async { Ok("ok".to_string()) })
            .await
            .unwrap();
        let snap = harness.store.snapshot().await;
        assert_eq!(snap.all_time.message_count, 1);
        assert_eq!(snap.all_time.input, 20);
        assert_eq!(snap.all_time.output, 5);
    }
}
