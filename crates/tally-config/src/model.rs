// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tally usage meter.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use tally_core::ImportStrategy;

/// Top-level Tally configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// General meter behavior.
    #[serde(default)]
    pub meter: MeterConfig,

    /// Time source and reference-clock resync.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Remote price catalog settings.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Settings-blob persistence (CLI and standalone embedding).
    #[serde(default)]
    pub store: StoreConfig,

    /// Import merge behavior.
    #[serde(default)]
    pub import: ImportConfig,
}

/// General meter behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MeterConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Time source configuration.
///
/// When `reference_url` is set, a background task periodically corrects the
/// meter clock against that endpoint's `Date` header. Resync is best-effort
/// and never blocks recording.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    /// HTTP endpoint used as the external reference clock. `None` disables
    /// resync entirely.
    #[serde(default)]
    pub reference_url: Option<String>,

    /// Seconds between reference resyncs.
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            reference_url: None,
            resync_interval_secs: default_resync_interval_secs(),
        }
    }
}

fn default_resync_interval_secs() -> u64 {
    3600 // 1 hour
}

/// Remote price catalog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Request source whose prices the catalog covers. Refresh only happens
    /// while this source is the active one.
    #[serde(default = "default_catalog_provider")]
    pub provider: String,

    /// Catalog endpoint returning per-token model prices.
    #[serde(default = "default_catalog_endpoint")]
    pub endpoint: String,

    /// Cache freshness threshold in hours.
    #[serde(default = "default_refresh_ttl_hours")]
    pub refresh_ttl_hours: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            provider: default_catalog_provider(),
            endpoint: default_catalog_endpoint(),
            refresh_ttl_hours: default_refresh_ttl_hours(),
        }
    }
}

fn default_catalog_provider() -> String {
    "openrouter".to_string()
}

fn default_catalog_endpoint() -> String {
    "https://openrouter.ai/api/v1/models".to_string()
}

fn default_refresh_ttl_hours() -> u64 {
    24
}

/// Settings-blob persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path of the JSON settings blob used by the CLI and standalone hosts.
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
        }
    }
}

fn default_settings_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tally").join("settings.json"))
        .unwrap_or_else(|| std::path::PathBuf::from("tally-settings.json"))
        .to_string_lossy()
        .into_owned()
}

/// Import merge configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// Merge strategy used when no explicit strategy is passed.
    ///
    /// `add` keeps the historical additive behavior (re-importing an export
    /// doubles counts); `replace` makes re-imports idempotent.
    #[serde(default)]
    pub default_strategy: ImportStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = TallyConfig::default();
        assert_eq!(config.meter.log_level, "info");
        assert!(config.clock.reference_url.is_none());
        assert_eq!(config.clock.resync_interval_secs, 3600);
        assert_eq!(config.catalog.provider, "openrouter");
        assert_eq!(config.catalog.refresh_ttl_hours, 24);
        assert_eq!(config.import.default_strategy, ImportStrategy::Add);
        assert!(!config.store.settings_path.is_empty());
    }
}
