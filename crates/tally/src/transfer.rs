// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tally export` and `tally import` command implementations.

use std::path::Path;
use std::sync::Arc;

use tally_clock::TimeSource;
use tally_config::model::TallyConfig;
use tally_core::{ImportStrategy, TallyError};
use tally_store::{export, export_to_json, import_json, JsonSettingsStore, UsageStore};

async fn open_store(config: &TallyConfig) -> Result<Arc<UsageStore>, TallyError> {
    let time = Arc::new(TimeSource::system());
    let persist = Arc::new(JsonSettingsStore::new(config.store.settings_path.clone()));
    Ok(Arc::new(UsageStore::load(time, persist).await?))
}

/// Run the `tally export` command.
pub async fn run_export(config: &TallyConfig, out: Option<&Path>) -> Result<(), TallyError> {
    let store = open_store(config).await?;
    let file = export(&store).await;
    let json = export_to_json(&file)?;

    match out {
        Some(path) => {
            tokio::fs::write(path, &json)
                .await
                .map_err(|e| TallyError::Storage { source: Box::new(e) })?;
            eprintln!("tally: export written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Run the `tally import` command.
pub async fn run_import(
    config: &TallyConfig,
    file: &Path,
    strategy: ImportStrategy,
) -> Result<(), TallyError> {
    let json = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| TallyError::Storage { source: Box::new(e) })?;

    let store = open_store(config).await?;
    let summary = import_json(&store, &json, strategy).await?;

    eprintln!(
        "tally: merged {} buckets, {} prices, {} colors (strategy: {strategy})",
        summary.buckets_merged, summary.prices_applied, summary.colors_applied
    );
    Ok(())
}
