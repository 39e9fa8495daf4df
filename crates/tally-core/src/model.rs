// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The persisted data model: usage buckets, the aggregate tree, price
//! entries, and the versioned settings blob.
//!
//! Every counter is additive and non-negative. `UsageBucket::total` is
//! maintained at write time by [`UsageBucket::apply`] and never recomputed
//! lazily; [`UsageBucket::merge`] preserves the same invariant for import
//! merges.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// Version tag of the persisted settings blob.
pub const SETTINGS_VERSION: u32 = 1;

/// Identity tag written into export files and validated on import.
pub const APP_NAME: &str = "tally";

/// An additive counter set keyed by a time window or identity dimension.
///
/// Day and hour buckets additionally carry per-model and per-source nested
/// breakdowns; nested buckets never nest further.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBucket {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub reasoning: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, UsageBucket>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, UsageBucket>,
}

impl UsageBucket {
    /// Apply one recorded exchange to this bucket.
    ///
    /// Maintains `total = input + output + reasoning` and counts one message.
    pub fn apply(&mut self, input: u64, output: u64, reasoning: u64) {
        self.input += input;
        self.output += output;
        self.reasoning += reasoning;
        self.total += input + output + reasoning;
        self.message_count += 1;
    }

    /// Additively merge another bucket into this one, including nested
    /// model/source breakdowns.
    pub fn merge(&mut self, other: &UsageBucket) {
        self.input += other.input;
        self.output += other.output;
        self.reasoning += other.reasoning;
        self.total += other.total;
        self.message_count += other.message_count;
        for (key, bucket) in &other.models {
            self.models.entry(key.clone()).or_default().merge(bucket);
        }
        for (key, bucket) in &other.sources {
            self.sources.entry(key.clone()).or_default().merge(bucket);
        }
    }

    /// Whether the write-time total invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.total == self.input + self.output + self.reasoning
    }
}

fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// The full aggregate tree owned by the usage store.
///
/// All maps are append-only with respect to keys; counters only grow except
/// through explicit reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageTree {
    /// Usage since the last explicit session reset (or process start).
    #[serde(default)]
    pub session: UsageBucket,
    /// When the current session window began.
    #[serde(default = "now_utc")]
    pub session_started: DateTime<Utc>,
    /// Usage since the last full reset.
    #[serde(default)]
    pub all_time: UsageBucket,
    /// Keyed `YYYY-MM-DD`.
    #[serde(default)]
    pub by_day: BTreeMap<String, UsageBucket>,
    /// Keyed `YYYY-MM-DDTHH`.
    #[serde(default)]
    pub by_hour: BTreeMap<String, UsageBucket>,
    /// Keyed `YYYY-Www` (ISO-8601 week).
    #[serde(default)]
    pub by_week: BTreeMap<String, UsageBucket>,
    /// Keyed `YYYY-MM`.
    #[serde(default)]
    pub by_month: BTreeMap<String, UsageBucket>,
    #[serde(default)]
    pub by_chat: BTreeMap<String, UsageBucket>,
    #[serde(default)]
    pub by_model: BTreeMap<String, UsageBucket>,
    #[serde(default)]
    pub by_source: BTreeMap<String, UsageBucket>,
}

impl Default for UsageTree {
    fn default() -> Self {
        Self {
            session: UsageBucket::default(),
            session_started: Utc::now(),
            all_time: UsageBucket::default(),
            by_day: BTreeMap::new(),
            by_hour: BTreeMap::new(),
            by_week: BTreeMap::new(),
            by_month: BTreeMap::new(),
            by_chat: BTreeMap::new(),
            by_model: BTreeMap::new(),
            by_source: BTreeMap::new(),
        }
    }
}

/// A user-configured (or catalog-derived) model price in USD per million tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    #[serde(default)]
    pub input_per_million: f64,
    #[serde(default)]
    pub output_per_million: f64,
}

impl PriceEntry {
    /// Whether both directions are unpriced.
    pub fn is_zero(&self) -> bool {
        self.input_per_million == 0.0 && self.output_per_million == 0.0
    }
}

/// A raw catalog price in USD per single token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPrice {
    #[serde(default)]
    pub prompt: f64,
    #[serde(default)]
    pub completion: f64,
}

/// Cached remote price catalog, replaced wholesale on refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogCache {
    #[serde(default)]
    pub entries: BTreeMap<String, RawPrice>,
    #[serde(default)]
    pub last_fetched: Option<DateTime<Utc>>,
}

/// The versioned settings blob persisted through the host's settings store.
///
/// `miniview` is an opaque passthrough for the out-of-scope UI layer; it is
/// preserved across load/save but never interpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub model_colors: BTreeMap<String, String>,
    #[serde(default)]
    pub model_prices: BTreeMap<String, PriceEntry>,
    #[serde(default)]
    pub catalog_prices: CatalogCache,
    #[serde(default)]
    pub miniview: serde_json::Value,
    #[serde(default)]
    pub usage: UsageTree,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            model_colors: BTreeMap::new(),
            model_prices: BTreeMap::new(),
            catalog_prices: CatalogCache::default(),
            miniview: serde_json::Value::Null,
            usage: UsageTree::default(),
        }
    }
}

impl MeterSettings {
    /// Deserialize a persisted blob, tolerating missing fields from older
    /// versions. Blobs from a newer version are rejected.
    pub fn from_blob(value: &serde_json::Value) -> Result<Self, TallyError> {
        let settings: MeterSettings = serde_json::from_value(value.clone())
            .map_err(|e| TallyError::Storage { source: Box::new(e) })?;
        if settings.version > SETTINGS_VERSION {
            return Err(TallyError::Storage {
                source: format!(
                    "settings blob version {} is newer than supported version {}",
                    settings.version, SETTINGS_VERSION
                )
                .into(),
            });
        }
        Ok(settings)
    }

    /// Serialize into the blob form handed to the settings store.
    pub fn to_blob(&self) -> Result<serde_json::Value, TallyError> {
        serde_json::to_value(self).map_err(|e| TallyError::Storage { source: Box::new(e) })
    }
}
