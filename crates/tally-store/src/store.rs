// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The usage store: single mutation entry point for every aggregate.
//!
//! All persisted state lives behind one lock; every `record()` updates the
//! session, all-time, time-keyed, and identity-keyed buckets in a single
//! critical section, so observers never see a partially applied exchange.
//! After each mutation the store persists the settings blob and broadcasts
//! a full [`StatsSnapshot`] on a typed channel.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tally_clock::{day_key, hour_key, month_key, week_key, TimeSource};
use tally_core::{
    CatalogCache, ChatId, MeterSettings, ModelId, PriceEntry, RawPrice, SettingsStore, SourceId,
    TallyError, UsageBucket,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::snapshot::{build_snapshot, StatsSnapshot};

/// One finalized exchange, as handed to [`UsageStore::record`].
#[derive(Debug, Clone, Default)]
pub struct UsageRecord {
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
    pub chat: Option<ChatId>,
    pub model: Option<ModelId>,
    pub source: Option<SourceId>,
}

impl UsageRecord {
    /// A record with the given input/output counts and no attribution.
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            ..Self::default()
        }
    }

    pub fn with_reasoning(mut self, reasoning: u64) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_chat(mut self, chat: ChatId) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = Some(source);
        self
    }

    /// Total tokens this record accounts for.
    pub fn total(&self) -> u64 {
        self.input + self.output + self.reasoning
    }
}

/// The single source of truth for usage aggregates and the persisted
/// settings blob. Only this type mutates persisted state.
pub struct UsageStore {
    time: Arc<TimeSource>,
    persist: Arc<dyn SettingsStore>,
    state: tokio::sync::Mutex<MeterSettings>,
    changes: broadcast::Sender<StatsSnapshot>,
}

impl UsageStore {
    /// Create a store over already-loaded settings.
    pub fn new(
        time: Arc<TimeSource>,
        persist: Arc<dyn SettingsStore>,
        settings: MeterSettings,
    ) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            time,
            persist,
            state: tokio::sync::Mutex::new(settings),
            changes,
        }
    }

    /// Load settings from the host blob and start a fresh session window.
    ///
    /// The session bucket is ephemeral by design: process start begins a new
    /// session regardless of what was persisted.
    pub async fn load(
        time: Arc<TimeSource>,
        persist: Arc<dyn SettingsStore>,
    ) -> Result<Self, TallyError> {
        let mut settings = match persist.load().await? {
            Some(blob) => MeterSettings::from_blob(&blob)?,
            None => MeterSettings::default(),
        };
        settings.usage.session = UsageBucket::default();
        settings.usage.session_started = time.now();
        debug!("usage store loaded, session window started");
        Ok(Self::new(time, persist, settings))
    }

    /// Subscribe to the typed change channel. Every mutation broadcasts a
    /// full snapshot.
    pub fn subscribe(&self) -> broadcast::Receiver<StatsSnapshot> {
        self.changes.subscribe()
    }

    /// Record one finalized exchange into every aggregate dimension.
    ///
    /// Bucket keys are computed from the time source at call time, not at
    /// event-start time. All sub-updates happen in one critical section.
    pub async fn record(&self, record: UsageRecord) -> Result<(), TallyError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let now = self.time.now();
            apply_record(&mut state, &record, now);

            info!(
                input = record.input,
                output = record.output,
                reasoning = record.reasoning,
                total = record.total(),
                chat = record.chat.as_ref().map(|c| c.as_str()),
                model = record.model.as_ref().map(|m| m.as_str()),
                source = record.source.as_ref().map(|s| s.as_str()),
                "usage recorded"
            );

            let snapshot = build_snapshot(&state, now);
            self.persist_locked(&state).await?;
            snapshot
        };
        let _ = self.changes.send(snapshot);
        Ok(())
    }

    /// Zero the session bucket in place and restart the session clock.
    /// Every other aggregate is untouched.
    pub async fn reset_session(&self) -> Result<(), TallyError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let now = self.time.now();
            state.usage.session = UsageBucket::default();
            state.usage.session_started = now;
            info!("session usage reset");
            let snapshot = build_snapshot(&state, now);
            self.persist_locked(&state).await?;
            snapshot
        };
        let _ = self.changes.send(snapshot);
        Ok(())
    }

    /// Clear every aggregate to its zero state and restart the session clock.
    pub async fn reset_all(&self) -> Result<(), TallyError> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let now = self.time.now();
            state.usage = Default::default();
            state.usage.session_started = now;
            info!("all usage aggregates reset");
            let snapshot = build_snapshot(&state, now);
            self.persist_locked(&state).await?;
            snapshot
        };
        let _ = self.changes.send(snapshot);
        Ok(())
    }

    /// A consistent snapshot of every aggregate.
    pub async fn snapshot(&self) -> StatsSnapshot {
        let state = self.state.lock().await;
        build_snapshot(&state, self.time.now())
    }

    /// User-configured model prices (authoritative over the catalog).
    pub async fn model_prices(&self) -> BTreeMap<String, PriceEntry> {
        self.state.lock().await.model_prices.clone()
    }

    /// Set or replace a user-configured model price.
    pub async fn set_model_price(
        &self,
        model: &ModelId,
        entry: PriceEntry,
    ) -> Result<(), TallyError> {
        self.mutate(|state| {
            state.model_prices.insert(model.as_str().to_string(), entry);
            Ok(())
        })
        .await
    }

    /// The cached remote price catalog.
    pub async fn catalog(&self) -> CatalogCache {
        self.state.lock().await.catalog_prices.clone()
    }

    /// Replace the catalog cache wholesale with a fresh timestamp.
    pub async fn replace_catalog(
        &self,
        entries: BTreeMap<String, RawPrice>,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), TallyError> {
        self.mutate(|state| {
            state.catalog_prices = CatalogCache {
                entries,
                last_fetched: Some(fetched_at),
            };
            Ok(())
        })
        .await
    }

    /// User-assigned model colors (opaque to the core, carried for the UI).
    pub async fn model_colors(&self) -> BTreeMap<String, String> {
        self.state.lock().await.model_colors.clone()
    }

    /// Set or replace a model color.
    pub async fn set_model_color(&self, model: &ModelId, color: String) -> Result<(), TallyError> {
        self.mutate(|state| {
            state.model_colors.insert(model.as_str().to_string(), color);
            Ok(())
        })
        .await
    }

    /// A full clone of the current settings (for export).
    pub(crate) async fn settings(&self) -> MeterSettings {
        self.state.lock().await.clone()
    }

    /// Run a mutation under the lock, then persist and notify.
    pub(crate) async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut MeterSettings) -> Result<R, TallyError>,
    ) -> Result<R, TallyError> {
        let (result, snapshot) = {
            let mut state = self.state.lock().await;
            let result = f(&mut state)?;
            let snapshot = build_snapshot(&state, self.time.now());
            self.persist_locked(&state).await?;
            (result, snapshot)
        };
        let _ = self.changes.send(snapshot);
        Ok(result)
    }

    /// Persist the blob while the state lock is held.
    ///
    /// In-memory aggregates stay updated even when persistence fails; the
    /// error is surfaced to the caller after a warn.
    async fn persist_locked(&self, state: &MeterSettings) -> Result<(), TallyError> {
        let blob = state.to_blob()?;
        if let Err(e) = self.persist.save(&blob).await {
            warn!(error = %e, "failed to persist usage settings");
            return Err(e);
        }
        Ok(())
    }
}

/// Apply one record to every aggregate dimension of the tree.
fn apply_record(state: &mut MeterSettings, record: &UsageRecord, now: DateTime<Utc>) {
    let (input, output, reasoning) = (record.input, record.output, record.reasoning);
    let usage = &mut state.usage;

    usage.session.apply(input, output, reasoning);
    usage.all_time.apply(input, output, reasoning);

    for (map, key) in [
        (&mut usage.by_week, week_key(now)),
        (&mut usage.by_month, month_key(now)),
    ] {
        map.entry(key).or_default().apply(input, output, reasoning);
    }

    // Day and hour buckets carry nested per-model/per-source breakdowns.
    for (map, key) in [
        (&mut usage.by_day, day_key(now)),
        (&mut usage.by_hour, hour_key(now)),
    ] {
        let bucket = map.entry(key).or_default();
        bucket.apply(input, output, reasoning);
        if let Some(model) = &record.model {
            bucket
                .models
                .entry(model.as_str().to_string())
                .or_default()
                .apply(input, output, reasoning);
        }
        if let Some(source) = &record.source {
            bucket
                .sources
                .entry(source.as_str().to_string())
                .or_default()
                .apply(input, output, reasoning);
        }
    }

    if let Some(chat) = &record.chat {
        usage
            .by_chat
            .entry(chat.as_str().to_string())
            .or_default()
            .apply(input, output, reasoning);
    }
    if let Some(model) = &record.model {
        usage
            .by_model
            .entry(model.as_str().to_string())
            .or_default()
            .apply(input, output, reasoning);
    }
    if let Some(source) = &record.source {
        usage
            .by_source
            .entry(source.as_str().to_string())
            .or_default()
            .apply(input, output, reasoning);
    }
}
