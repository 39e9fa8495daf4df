// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the remote price catalog.
//!
//! The catalog endpoint returns per-token prices as decimal strings:
//! `{"data": [{"id": "...", "pricing": {"prompt": "0.000002",
//! "completion": "0.000004"}}]}`. Entries with unparsable prices are
//! skipped, not fatal.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use tally_core::{RawPrice, TallyError};
use tracing::{debug, warn};

/// Wire shape of the catalog response.
#[derive(Debug, Deserialize)]
struct CatalogResponse {
    data: Vec<CatalogModel>,
}

#[derive(Debug, Deserialize)]
struct CatalogModel {
    id: String,
    #[serde(default)]
    pricing: Option<CatalogPricing>,
}

#[derive(Debug, Deserialize)]
struct CatalogPricing {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    completion: Option<String>,
}

/// HTTP client for fetching the full price catalog.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    endpoint: String,
}

impl CatalogClient {
    /// Create a client against `endpoint`.
    pub fn new(endpoint: String) -> Result<Self, TallyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TallyError::Catalog {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, endpoint })
    }

    /// Overrides the endpoint (for testing with wiremock).
    #[cfg(test)]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Fetch the full catalog and extract per-model per-token prices.
    pub async fn fetch(&self) -> Result<BTreeMap<String, RawPrice>, TallyError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| TallyError::Catalog {
                message: format!("catalog request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TallyError::Catalog {
                message: format!("catalog request returned HTTP {status}"),
                source: None,
            });
        }

        let payload: CatalogResponse =
            response.json().await.map_err(|e| TallyError::Catalog {
                message: format!("catalog payload unparsable: {e}"),
                source: Some(Box::new(e)),
            })?;

        let mut entries = BTreeMap::new();
        for model in payload.data {
            let Some(pricing) = model.pricing else {
                continue;
            };
            match parse_pricing(&pricing) {
                Some(raw) => {
                    entries.insert(model.id, raw);
                }
                None => {
                    debug!(model = %model.id, "skipping catalog entry with unparsable pricing");
                }
            }
        }

        if entries.is_empty() {
            warn!("catalog fetch succeeded but produced no priced models");
        }
        Ok(entries)
    }
}

fn parse_pricing(pricing: &CatalogPricing) -> Option<RawPrice> {
    let prompt = pricing.prompt.as_deref()?.parse::<f64>().ok()?;
    let completion = pricing.completion.as_deref()?.parse::<f64>().ok()?;
    if prompt < 0.0 || completion < 0.0 {
        return None;
    }
    Some(RawPrice { prompt, completion })
}
