// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Price resolution and cost calculation.
//!
//! Resolution order: user-configured price (authoritative, never overwritten
//! automatically) -> cached catalog price (per-token, converted to
//! per-million) -> zero. Catalog refresh is gated on the active request
//! source matching the catalog's provider and on cache age; failures leave
//! the cache stale and are only visible through [`PriceResolver::health`].

use std::sync::Arc;

use chrono::Duration;
use tally_clock::TimeSource;
use tally_config::model::CatalogConfig;
use tally_core::{CatalogHealth, ModelId, PriceEntry, SourceId, TallyError};
use tally_store::UsageStore;
use tracing::{info, warn};

use crate::catalog::CatalogClient;

/// Tokens per price unit: catalog prices are per single token, user prices
/// and [`PriceEntry`] are per million.
const PER_MILLION: f64 = 1_000_000.0;

/// Resolves model prices and computes exchange costs.
pub struct PriceResolver {
    store: Arc<UsageStore>,
    time: Arc<TimeSource>,
    client: CatalogClient,
    config: CatalogConfig,
    /// Failure message of the most recent refresh attempt, for health reporting.
    last_error: tokio::sync::Mutex<Option<String>>,
}

impl PriceResolver {
    pub fn new(
        store: Arc<UsageStore>,
        time: Arc<TimeSource>,
        config: CatalogConfig,
    ) -> Result<Self, TallyError> {
        let client = CatalogClient::new(config.endpoint.clone())?;
        Ok(Self {
            store,
            time,
            client,
            config,
            last_error: tokio::sync::Mutex::new(None),
        })
    }

    /// Replace the catalog client (for testing against a mock endpoint).
    #[cfg(test)]
    pub(crate) fn with_client(mut self, client: CatalogClient) -> Self {
        self.client = client;
        self
    }

    /// Resolve the price for `model`.
    pub async fn get_price(&self, model: &ModelId) -> PriceEntry {
        if let Some(entry) = self.store.model_prices().await.get(model.as_str()) {
            return *entry;
        }
        if let Some(raw) = self.store.catalog().await.entries.get(model.as_str()) {
            return PriceEntry {
                input_per_million: raw.prompt * PER_MILLION,
                output_per_million: raw.completion * PER_MILLION,
            };
        }
        PriceEntry::default()
    }

    /// Cost of an exchange in USD.
    ///
    /// Returns exactly `0.0` for unpriced models, avoiding floating rounding
    /// noise from the multiplications.
    pub async fn calculate_cost(&self, input: u64, output: u64, model: &ModelId) -> f64 {
        let price = self.get_price(model).await;
        if price.is_zero() {
            return 0.0;
        }
        (input as f64 / PER_MILLION) * price.input_per_million
            + (output as f64 / PER_MILLION) * price.output_per_million
    }

    /// Refresh the catalog cache if the active source matches the catalog's
    /// provider and the cache is older than the freshness threshold.
    ///
    /// Returns whether a refresh happened. Fetch failures are non-fatal: the
    /// existing cache is left untouched and the failure is reported only
    /// through [`Self::health`].
    pub async fn maybe_refresh(&self, active_source: &SourceId) -> bool {
        if active_source.as_str() != self.config.provider {
            return false;
        }

        let now = self.time.now();
        let catalog = self.store.catalog().await;
        let ttl = Duration::hours(self.config.refresh_ttl_hours as i64);
        if let Some(fetched_at) = catalog.last_fetched {
            if now - fetched_at < ttl {
                return false;
            }
        }

        match self.client.fetch().await {
            Ok(entries) => {
                let count = entries.len();
                if let Err(e) = self.store.replace_catalog(entries, now).await {
                    warn!(error = %e, "fetched catalog but failed to persist it");
                    *self.last_error.lock().await = Some(e.to_string());
                    return false;
                }
                *self.last_error.lock().await = None;
                info!(models = count, "price catalog refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "catalog refresh failed, keeping stale cache");
                *self.last_error.lock().await = Some(e.to_string());
                false
            }
        }
    }

    /// Freshness of the catalog cache.
    pub async fn health(&self) -> CatalogHealth {
        let catalog = self.store.catalog().await;
        let Some(fetched_at) = catalog.last_fetched else {
            return match self.last_error.lock().await.clone() {
                Some(e) => CatalogHealth::Stale(e),
                None => CatalogHealth::Empty,
            };
        };

        let age = self.time.now() - fetched_at;
        let ttl = Duration::hours(self.config.refresh_ttl_hours as i64);
        if age < ttl {
            CatalogHealth::Fresh
        } else if let Some(e) = self.last_error.lock().await.clone() {
            CatalogHealth::Stale(e)
        } else {
            CatalogHealth::Stale(format!("cache is {}h old", age.num_hours()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use tally_core::{MeterSettings, RawPrice, SettingsStore};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NullSettings;

    #[async_trait]
    impl SettingsStore for NullSettings {
        async fn load(&self) -> Result<Option<serde_json::Value>, TallyError> {
            Ok(None)
        }

        async fn save(&self, _blob: &serde_json::Value) -> Result<(), TallyError> {
            Ok(())
        }
    }

    fn fixture() -> (Arc<UsageStore>, Arc<TimeSource>) {
        let time = Arc::new(TimeSource::fixed(
            Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
        ));
        let store = Arc::new(UsageStore::new(
            time.clone(),
            Arc::new(NullSettings),
            MeterSettings::default(),
        ));
        (store, time)
    }

    fn resolver(store: Arc<UsageStore>, time: Arc<TimeSource>) -> PriceResolver {
        PriceResolver::new(store, time, CatalogConfig::default()).unwrap()
    }

    async fn seed_catalog(store: &UsageStore, fetched_at: chrono::DateTime<Utc>) {
        let mut entries = BTreeMap::new();
        entries.insert(
            "vendor/model-a".to_string(),
            RawPrice {
                prompt: 0.000002,
                completion: 0.000004,
            },
        );
        store.replace_catalog(entries, fetched_at).await.unwrap();
    }

    #[tokio::test]
    async fn catalog_price_converts_to_per_million() {
        let (store, time) = fixture();
        seed_catalog(&store, time.now()).await;

        let resolver = resolver(store, time);
        let price = resolver.get_price(&ModelId::from("vendor/model-a")).await;
        assert_eq!(price.input_per_million, 2.0);
        assert_eq!(price.output_per_million, 4.0);
    }

    #[tokio::test]
    async fn user_override_beats_catalog() {
        let (store, time) = fixture();
        seed_catalog(&store, time.now()).await;
        store
            .set_model_price(
                &ModelId::from("vendor/model-a"),
                PriceEntry {
                    input_per_million: 9.0,
                    output_per_million: 18.0,
                },
            )
            .await
            .unwrap();

        let resolver = resolver(store, time);
        let price = resolver.get_price(&ModelId::from("vendor/model-a")).await;
        assert_eq!(price.input_per_million, 9.0);
    }

    #[tokio::test]
    async fn unknown_model_is_unpriced_and_costs_zero() {
        let (store, time) = fixture();
        let resolver = resolver(store, time);

        let model = ModelId::from("nobody/knows");
        assert!(resolver.get_price(&model).await.is_zero());
        let cost = resolver.calculate_cost(1_000_000, 1_000_000, &model).await;
        assert_eq!(cost, 0.0, "unpriced models short-circuit to exactly zero");
    }

    #[tokio::test]
    async fn cost_is_tokens_over_million_times_price() {
        let (store, time) = fixture();
        seed_catalog(&store, time.now()).await;
        let resolver = resolver(store, time);

        let cost = resolver
            .calculate_cost(500_000, 250_000, &ModelId::from("vendor/model-a"))
            .await;
        // 0.5 * 2.0 + 0.25 * 4.0
        assert!((cost - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn refresh_skipped_for_other_sources() {
        let (store, time) = fixture();
        let resolver = resolver(store, time);
        assert!(!resolver.maybe_refresh(&SourceId::from("anthropic")).await);
        assert_eq!(resolver.health().await, CatalogHealth::Empty);
    }

    #[tokio::test]
    async fn refresh_skipped_while_cache_is_fresh() {
        let server = MockServer::start().await;
        // No expectations mounted: any request would 404 and fail the refresh.
        let (store, time) = fixture();
        seed_catalog(&store, time.now() - Duration::hours(1)).await;

        let resolver = resolver(store.clone(), time)
            .with_client(CatalogClient::new(server.uri()).unwrap());
        assert!(!resolver.maybe_refresh(&SourceId::from("openrouter")).await);
        assert_eq!(store.catalog().await.entries.len(), 1, "cache untouched");
        assert_eq!(resolver.health().await, CatalogHealth::Fresh);
    }

    #[tokio::test]
    async fn stale_cache_is_replaced_wholesale() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "id": "vendor/model-b",
                      "pricing": { "prompt": "0.000001", "completion": "0.000003" } }
                ]
            })))
            .mount(&server)
            .await;

        let (store, time) = fixture();
        seed_catalog(&store, time.now() - Duration::hours(25)).await;

        let resolver = resolver(store.clone(), time.clone())
            .with_client(CatalogClient::new(server.uri()).unwrap());
        assert!(resolver.maybe_refresh(&SourceId::from("openrouter")).await);

        let catalog = store.catalog().await;
        // Wholesale replace: the old entry is gone, not merged.
        assert!(!catalog.entries.contains_key("vendor/model-a"));
        assert_eq!(catalog.entries["vendor/model-b"].completion, 0.000003);
        assert_eq!(catalog.last_fetched, Some(time.now()));
        assert_eq!(resolver.health().await, CatalogHealth::Fresh);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_cache_and_reports_stale() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (store, time) = fixture();
        seed_catalog(&store, time.now() - Duration::hours(30)).await;

        let resolver = resolver(store.clone(), time)
            .with_client(CatalogClient::new(server.uri()).unwrap());
        assert!(!resolver.maybe_refresh(&SourceId::from("openrouter")).await);

        assert_eq!(store.catalog().await.entries.len(), 1, "stale cache kept");
        match resolver.health().await {
            CatalogHealth::Stale(reason) => assert!(reason.contains("500")),
            other => panic!("expected stale health, got {other:?}"),
        }
    }
}
