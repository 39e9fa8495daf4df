// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External reference clock and the periodic resync task.
//!
//! Resync is best-effort: a failed fetch leaves the current correction in
//! place and is logged at warn. The spawned task is returned as a
//! [`tokio::task::JoinHandle`] so the host owns its join point.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_core::TallyError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::time_source::TimeSource;

/// An external source of the current time.
#[async_trait]
pub trait ReferenceClock: Send + Sync {
    /// Fetch the reference's idea of "now".
    async fn fetch_now(&self) -> Result<DateTime<Utc>, TallyError>;
}

/// Reference clock backed by the `Date` header of an HTTP HEAD request.
pub struct HttpReferenceClock {
    client: reqwest::Client,
    url: String,
}

impl HttpReferenceClock {
    /// Create a reference clock against `url`.
    pub fn new(url: String) -> Result<Self, TallyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TallyError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    /// The configured endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReferenceClock for HttpReferenceClock {
    async fn fetch_now(&self) -> Result<DateTime<Utc>, TallyError> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .await
            .map_err(|e| TallyError::Internal(format!("reference clock request failed: {e}")))?;

        let header = response
            .headers()
            .get(reqwest::header::DATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                TallyError::Internal("reference clock response has no Date header".into())
            })?;

        let parsed = DateTime::parse_from_rfc2822(header).map_err(|e| {
            TallyError::Internal(format!("reference clock Date header unparsable: {e}"))
        })?;
        Ok(parsed.with_timezone(&Utc))
    }
}

/// Fetch the reference once and apply the correction.
pub async fn resync_once(
    time: &TimeSource,
    reference: &dyn ReferenceClock,
) -> Result<(), TallyError> {
    let reference_now = reference.fetch_now().await?;
    time.apply_reference(reference_now);
    Ok(())
}

/// Spawn the periodic resync task.
///
/// Fetch failures are logged and skipped; the loop never stops on error.
/// Abort the returned handle to stop resyncing.
pub fn spawn_resync(
    time: Arc<TimeSource>,
    reference: Arc<dyn ReferenceClock>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; correct at startup.
        loop {
            ticker.tick().await;
            match resync_once(&time, reference.as_ref()).await {
                Ok(()) => debug!("reference clock resync complete"),
                Err(e) => warn!(error = %e, "reference clock resync failed, keeping current offset"),
            }
        }
    })
}
