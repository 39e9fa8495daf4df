// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Import/export of usage snapshots.
//!
//! Exports carry a version and an identity tag; both are validated on import
//! before anything is touched, so a rejected payload never partially mutates
//! the store. Keyed usage maps merge additively by default (re-importing the
//! same file doubles counts -- the documented historical behavior) or by
//! replace-on-conflict when [`ImportStrategy::Replace`] is selected. Price
//! and color maps always merge by per-key overwrite. Session data is never
//! imported.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{
    ImportStrategy, PriceEntry, TallyError, UsageBucket, UsageTree, APP_NAME,
};
use tracing::info;

use crate::store::UsageStore;

/// Version tag of the export file format.
pub const EXPORT_VERSION: &str = "1.0";

/// The on-disk export file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportFile {
    pub version: String,
    pub export_date: DateTime<Utc>,
    /// Identity tag; imports from other applications are rejected.
    pub app: String,
    pub usage: UsageTree,
    pub model_prices: BTreeMap<String, PriceEntry>,
    pub model_colors: BTreeMap<String, String>,
}

/// What an import touched, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub buckets_merged: usize,
    pub prices_applied: usize,
    pub colors_applied: usize,
}

/// Produce an export file from the store's current state.
pub async fn export(store: &UsageStore) -> ExportFile {
    let settings = store.settings().await;
    ExportFile {
        version: EXPORT_VERSION.to_string(),
        export_date: Utc::now(),
        app: APP_NAME.to_string(),
        usage: settings.usage,
        model_prices: settings.model_prices,
        model_colors: settings.model_colors,
    }
}

/// Serialize an export file to pretty JSON.
pub fn export_to_json(file: &ExportFile) -> Result<String, TallyError> {
    serde_json::to_string_pretty(file).map_err(|e| TallyError::Storage { source: Box::new(e) })
}

/// Parse and validate an export payload, then merge it into the store.
pub async fn import_json(
    store: &UsageStore,
    json: &str,
    strategy: ImportStrategy,
) -> Result<ImportSummary, TallyError> {
    // Validate fully before mutating anything.
    let file: ExportFile = serde_json::from_str(json)
        .map_err(|e| TallyError::Import(format!("malformed export payload: {e}")))?;
    if file.version != EXPORT_VERSION {
        return Err(TallyError::Import(format!(
            "unsupported export version `{}` (expected `{EXPORT_VERSION}`)",
            file.version
        )));
    }
    if file.app != APP_NAME {
        return Err(TallyError::Import(format!(
            "export was produced by `{}`, not `{APP_NAME}`",
            file.app
        )));
    }

    let summary = store
        .mutate(|state| {
            let mut summary = ImportSummary {
                prices_applied: file.model_prices.len(),
                colors_applied: file.model_colors.len(),
                ..ImportSummary::default()
            };

            let usage = &mut state.usage;
            merge_bucket(&mut usage.all_time, &file.usage.all_time, strategy);
            summary.buckets_merged += 1;

            for (dst, src) in [
                (&mut usage.by_day, &file.usage.by_day),
                (&mut usage.by_hour, &file.usage.by_hour),
                (&mut usage.by_week, &file.usage.by_week),
                (&mut usage.by_month, &file.usage.by_month),
                (&mut usage.by_chat, &file.usage.by_chat),
                (&mut usage.by_model, &file.usage.by_model),
                (&mut usage.by_source, &file.usage.by_source),
            ] {
                summary.buckets_merged += merge_map(dst, src, strategy);
            }

            // Prices and colors: last writer wins per key, regardless of
            // the usage strategy.
            for (model, price) in &file.model_prices {
                state.model_prices.insert(model.clone(), *price);
            }
            for (model, color) in &file.model_colors {
                state.model_colors.insert(model.clone(), color.clone());
            }

            Ok(summary)
        })
        .await?;

    info!(
        strategy = %strategy,
        buckets = summary.buckets_merged,
        prices = summary.prices_applied,
        colors = summary.colors_applied,
        "import merged"
    );
    Ok(summary)
}

fn merge_bucket(dst: &mut UsageBucket, src: &UsageBucket, strategy: ImportStrategy) {
    match strategy {
        ImportStrategy::Add => dst.merge(src),
        ImportStrategy::Replace => *dst = src.clone(),
    }
}

fn merge_map(
    dst: &mut BTreeMap<String, UsageBucket>,
    src: &BTreeMap<String, UsageBucket>,
    strategy: ImportStrategy,
) -> usize {
    for (key, bucket) in src {
        match strategy {
            ImportStrategy::Add => dst.entry(key.clone()).or_default().merge(bucket),
            ImportStrategy::Replace => {
                dst.insert(key.clone(), bucket.clone());
            }
        }
    }
    src.len()
}
