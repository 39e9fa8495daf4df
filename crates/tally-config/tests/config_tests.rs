// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Tally configuration system.

use tally_config::diagnostic::suggest_key;
use tally_config::{load_and_validate_str, load_config_from_str};
use tally_core::ImportStrategy;

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_tally_config() {
    let toml = r#"
[meter]
log_level = "debug"

[clock]
reference_url = "https://time.example"
resync_interval_secs = 600

[catalog]
provider = "openrouter"
endpoint = "https://openrouter.ai/api/v1/models"
refresh_ttl_hours = 12

[store]
settings_path = "/tmp/tally-settings.json"

[import]
default_strategy = "replace"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.meter.log_level, "debug");
    assert_eq!(config.clock.reference_url.as_deref(), Some("https://time.example"));
    assert_eq!(config.clock.resync_interval_secs, 600);
    assert_eq!(config.catalog.provider, "openrouter");
    assert_eq!(config.catalog.refresh_ttl_hours, 12);
    assert_eq!(config.store.settings_path, "/tmp/tally-settings.json");
    assert_eq!(config.import.default_strategy, ImportStrategy::Replace);
}

/// Unknown field in [catalog] section produces an error.
#[test]
fn unknown_field_in_catalog_produces_error() {
    let toml = r#"
[catalog]
endpont = "https://x"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("endpont"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.meter.log_level, "info");
    assert!(config.clock.reference_url.is_none());
    assert_eq!(config.clock.resync_interval_secs, 3600);
    assert_eq!(config.catalog.provider, "openrouter");
    assert_eq!(config.catalog.endpoint, "https://openrouter.ai/api/v1/models");
    assert_eq!(config.catalog.refresh_ttl_hours, 24);
    assert_eq!(config.import.default_strategy, ImportStrategy::Add);
}

/// load_and_validate_str surfaces validation errors for semantic problems.
#[test]
fn semantic_validation_errors_are_surfaced() {
    let toml = r#"
[meter]
log_level = "loud"

[catalog]
refresh_ttl_hours = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2, "all validation errors collected");
    let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(rendered.iter().any(|m| m.contains("log_level")));
    assert!(rendered.iter().any(|m| m.contains("refresh_ttl_hours")));
}

/// An invalid type for a numeric key is reported with the key path.
#[test]
fn invalid_type_reports_key_path() {
    let toml = r#"
[clock]
resync_interval_secs = "soon"
"#;

    let err = load_config_from_str(toml).expect_err("should reject wrong type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("resync_interval_secs"),
        "got: {err_str}"
    );
}

/// Typo suggestions work for config keys.
#[test]
fn typo_suggestions_for_section_keys() {
    let valid = &["reference_url", "resync_interval_secs"];
    assert_eq!(
        suggest_key("referene_url", valid),
        Some("reference_url".to_string())
    );
}

/// Overrides merge over TOML values through dotted paths, the same shape the
/// `TALLY_*` env provider produces.
#[test]
fn dotted_override_wins_over_toml() {
    use figment::providers::{Format, Serialized, Toml};
    use figment::Figment;
    use tally_config::model::TallyConfig;

    let config: TallyConfig = Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(Toml::string("[catalog]\nprovider = \"openrouter\""))
        .merge(("catalog.provider", "local-proxy"))
        .extract()
        .expect("config should extract");

    assert_eq!(config.catalog.provider, "local-proxy");
}

/// `refresh_ttl_hours` must map as one key, not split on underscores.
#[test]
fn underscore_keys_survive_dotted_merge() {
    use figment::providers::Serialized;
    use figment::Figment;
    use tally_config::model::TallyConfig;

    let config: TallyConfig = Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(("catalog.refresh_ttl_hours", 6u64))
        .extract()
        .expect("should set refresh_ttl_hours via dot notation");

    assert_eq!(config.catalog.refresh_ttl_hours, 6);
}
