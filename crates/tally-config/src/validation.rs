// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as URL shapes, non-empty paths, and non-zero intervals.

use crate::diagnostic::ConfigError;
use crate::model::TallyConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TallyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.meter.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "meter.log_level `{}` is not one of {}",
                config.meter.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if let Some(url) = &config.clock.reference_url {
        if !is_http_url(url) {
            errors.push(ConfigError::Validation {
                message: format!("clock.reference_url `{url}` is not an http(s) URL"),
            });
        }
    }

    if config.clock.resync_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "clock.resync_interval_secs must be greater than zero".to_string(),
        });
    }

    if config.catalog.provider.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "catalog.provider must not be empty".to_string(),
        });
    }

    if !is_http_url(&config.catalog.endpoint) {
        errors.push(ConfigError::Validation {
            message: format!(
                "catalog.endpoint `{}` is not an http(s) URL",
                config.catalog.endpoint
            ),
        });
    }

    if config.catalog.refresh_ttl_hours == 0 {
        errors.push(ConfigError::Validation {
            message: "catalog.refresh_ttl_hours must be greater than zero".to_string(),
        });
    }

    if config.store.settings_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "store.settings_path must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&TallyConfig::default()).is_ok());
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let mut config = TallyConfig::default();
        config.meter.log_level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("log_level"));
    }

    #[test]
    fn non_http_reference_url_is_rejected() {
        let mut config = TallyConfig::default();
        config.clock.reference_url = Some("ftp://time.example".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_ttl_and_interval_are_rejected() {
        let mut config = TallyConfig::default();
        config.catalog.refresh_ttl_hours = 0;
        config.clock.resync_interval_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2, "all errors are collected, not fail-fast");
    }
}
