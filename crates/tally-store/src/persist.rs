// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-file implementation of the host settings-store seam.
//!
//! Hosts that embed the meter normally supply their own [`SettingsStore`];
//! this file-backed one serves the CLI and tests. Writes go through a temp
//! file followed by a rename so a crash never leaves a torn blob.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tally_core::{SettingsStore, TallyError};
use tracing::debug;

/// Settings blob persisted as pretty JSON at a fixed path.
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> TallyError {
    TallyError::Storage { source: Box::new(e) }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> Result<Option<serde_json::Value>, TallyError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let value = serde_json::from_str(&content).map_err(storage_err)?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn save(&self, blob: &serde_json::Value) -> Result<(), TallyError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
        }

        let content = serde_json::to_string_pretty(blob).map_err(storage_err)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await.map_err(storage_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(storage_err)?;
        debug!(path = %self.path.display(), "settings blob persisted");
        Ok(())
    }
}
