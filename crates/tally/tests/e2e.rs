// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete metering pipeline.
//!
//! Each test wires the real store and tracker over mock host services (and
//! a real JSON settings file where persistence matters), then drives the
//! pipeline with lifecycle events the way a host would.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tally_clock::TimeSource;
use tally_core::{
    ChatId, GenerationKind, ImportStrategy, MessageEventKind, ModelId, PriceEntry,
    TranscriptMessage,
};
use tally_price::PriceResolver;
use tally_store::{export, export_to_json, import_json, JsonSettingsStore, UsageRecord, UsageStore};
use tally_test_utils::TestHarness;
use tally_tracker::{LifecycleTracker, TrackerPhase};

fn tracker_for(harness: &TestHarness) -> LifecycleTracker {
    LifecycleTracker::new(
        harness.store.clone(),
        harness.counter.clone(),
        harness.transcript.clone(),
        harness.provider.clone(),
    )
}

fn reply(text: &str, token_count: Option<u64>) -> TranscriptMessage {
    TranscriptMessage {
        text: text.to_string(),
        token_count,
        reasoning: None,
        count_includes_reasoning: false,
    }
}

// ---- Full exchange through to the persisted blob ----

#[tokio::test]
async fn exchange_flows_into_persisted_settings() {
    let harness = TestHarness::builder().build();
    harness.transcript.open_chat(ChatId::from("chat-1"));
    harness.counter.set_count("full prompt", 250);

    let tracker = tracker_for(&harness);
    tracker.on_generation_started(GenerationKind::Normal, false).await;
    tracker.on_prompt_ready("full prompt", false).await;
    let index = harness.transcript.push_message(reply("answer", Some(90)));
    tracker.on_message_received(index, MessageEventKind::Generated).await;

    let blob = harness.persist.persisted().expect("settings persisted");
    assert_eq!(blob["usage"]["all_time"]["input"], 250);
    assert_eq!(blob["usage"]["all_time"]["output"], 90);
    assert_eq!(blob["usage"]["by_chat"]["chat-1"]["total"], 340);
    assert_eq!(
        blob["usage"]["by_day"]["2025-06-02"]["models"]["mock/model"]["total"],
        340
    );
}

// ---- Interleaved chats and overlapping generations ----

#[tokio::test]
async fn chat_switch_never_leaks_between_chats() {
    let harness = TestHarness::builder().build();
    harness.transcript.open_chat(ChatId::from("chat-a"));
    harness.counter.set_count("prompt a", 500);
    harness.counter.set_count("prompt b", 70);

    let tracker = tracker_for(&harness);

    // A generation starts in chat A, but the user switches chats before it
    // completes: nothing from chat A may leak into chat B's accounting.
    tracker.on_generation_started(GenerationKind::Normal, false).await;
    tracker.on_prompt_ready("prompt a", false).await;
    harness.transcript.open_chat(ChatId::from("chat-b"));
    tracker.on_chat_changed().await;
    assert_eq!(tracker.phase().await, TrackerPhase::Idle);

    // A fresh exchange in chat B records normally.
    tracker.on_generation_started(GenerationKind::Normal, false).await;
    tracker.on_prompt_ready("prompt b", false).await;
    let index = harness.transcript.push_message(reply("reply b", Some(30)));
    tracker.on_message_received(index, MessageEventKind::Generated).await;

    let snap = harness.store.snapshot().await;
    assert_eq!(snap.all_time.message_count, 1);
    assert_eq!(snap.all_time.input, 70);
    assert!(!snap.by_chat.contains_key("chat-a"));
    assert_eq!(snap.by_chat["chat-b"].total, 100);
}

// ---- Stopped generations ----

#[tokio::test]
async fn stopped_generation_accounts_partial_output() {
    let harness = TestHarness::builder().build();
    harness.counter.set_count("expensive prompt", 300);
    harness.counter.set_count("the partial stream", 45);

    let tracker = tracker_for(&harness);
    tracker.on_generation_started(GenerationKind::Normal, false).await;
    tracker.on_prompt_ready("expensive prompt", false).await;
    harness.transcript.set_streaming(Some("the partial stream"));
    tracker.on_generation_stopped().await;

    let snap = harness.store.snapshot().await;
    assert_eq!((snap.all_time.input, snap.all_time.output), (300, 45));
    assert_eq!(snap.all_time.message_count, 1);
}

// ---- Cost attribution over recorded usage ----

#[tokio::test]
async fn recorded_usage_prices_through_override_chain() {
    let harness = TestHarness::builder().build();
    harness.counter.set_count("prompt", 1_000_000);

    let tracker = tracker_for(&harness);
    tracker.on_generation_started(GenerationKind::Normal, false).await;
    tracker.on_prompt_ready("prompt", false).await;
    let index = harness.transcript.push_message(reply("out", Some(500_000)));
    tracker.on_message_received(index, MessageEventKind::Generated).await;

    harness
        .store
        .set_model_price(
            &ModelId::from("mock/model"),
            PriceEntry {
                input_per_million: 3.0,
                output_per_million: 15.0,
            },
        )
        .await
        .unwrap();

    let resolver = PriceResolver::new(
        harness.store.clone(),
        harness.time.clone(),
        tally_config::model::CatalogConfig::default(),
    )
    .unwrap();

    let snap = harness.store.snapshot().await;
    let bucket = &snap.by_model["mock/model"];
    let cost = resolver
        .calculate_cost(bucket.input, bucket.output, &ModelId::from("mock/model"))
        .await;
    // 1M input * $3/M + 0.5M output * $15/M
    assert!((cost - 10.5).abs() < 1e-9);
}

// ---- Persistence across process restarts ----

#[tokio::test]
async fn ledger_survives_restart_but_session_does_not() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let time = Arc::new(TimeSource::fixed(
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap(),
    ));

    {
        let persist = Arc::new(JsonSettingsStore::new(path.clone()));
        let store = UsageStore::load(time.clone(), persist).await.unwrap();
        store
            .record(UsageRecord::new(120, 60).with_model(ModelId::from("m")))
            .await
            .unwrap();
        let snap = store.snapshot().await;
        assert_eq!(snap.session.total, 180);
    }

    // "Restart": a new store over the same settings file.
    let persist = Arc::new(JsonSettingsStore::new(path));
    let store = UsageStore::load(time, persist).await.unwrap();
    let snap = store.snapshot().await;
    assert_eq!(snap.all_time.total, 180, "aggregates survive restart");
    assert_eq!(snap.by_model["m"].total, 180);
    assert_eq!(snap.session.total, 0, "session is per-process");
}

// ---- Export / import round trip ----

#[tokio::test]
async fn additive_round_trip_doubles_history() {
    let harness = TestHarness::builder().build();
    harness
        .store
        .record(
            UsageRecord::new(100, 40)
                .with_model(ModelId::from("m"))
                .with_chat(ChatId::from("c")),
        )
        .await
        .unwrap();

    let json = export_to_json(&export(&harness.store).await).unwrap();
    import_json(&harness.store, &json, ImportStrategy::Add)
        .await
        .unwrap();

    let snap = harness.store.snapshot().await;
    assert_eq!(snap.all_time.total, 280);
    assert_eq!(snap.by_day["2025-06-02"].total, 280);

    // The replace strategy makes a second import idempotent instead.
    let json = export_to_json(&export(&harness.store).await).unwrap();
    import_json(&harness.store, &json, ImportStrategy::Replace)
        .await
        .unwrap();
    assert_eq!(harness.store.snapshot().await.all_time.total, 280);
}

// ---- Change notifications ----

#[tokio::test]
async fn subscribers_see_consistent_snapshots() {
    let harness = TestHarness::builder().build();
    let mut changes = harness.store.subscribe();
    harness.counter.set_count("p", 10);

    let tracker = tracker_for(&harness);
    tracker.on_generation_started(GenerationKind::Normal, false).await;
    tracker.on_prompt_ready("p", false).await;
    let index = harness.transcript.push_message(reply("r", Some(4)));
    tracker.on_message_received(index, MessageEventKind::Generated).await;

    let snap = changes.recv().await.unwrap();
    // The snapshot is internally consistent: every dimension already
    // reflects the record.
    assert_eq!(snap.all_time.total, 14);
    assert_eq!(snap.today.total, 14);
    assert_eq!(snap.this_week.total, 14);
    assert_eq!(snap.session.total, 14);
}

// ---- Quiet background calls ----

#[tokio::test]
async fn quiet_call_records_alongside_lifecycle_traffic() {
    let harness = TestHarness::builder().build();
    harness.counter.set_count("visible prompt", 50);
    harness.counter.set_count("background prompt", 20);
    harness.counter.set_count("background reply", 8);

    let tracker = Arc::new(tracker_for(&harness));

    // A background subsystem fires mid-exchange.
    tracker.on_generation_started(GenerationKind::Normal, false).await;
    tracker.on_prompt_ready("visible prompt", false).await;
    tracker
        .track_quiet("background prompt", || async {
            Ok("background reply".to_string())
        })
        .await
        .unwrap();
    let index = harness.transcript.push_message(reply("visible reply", Some(12)));
    tracker.on_message_received(index, MessageEventKind::Generated).await;

    let snap = harness.store.snapshot().await;
    assert_eq!(snap.all_time.message_count, 2);
    assert_eq!(snap.all_time.input, 70);
    assert_eq!(snap.all_time.output, 20);
}
