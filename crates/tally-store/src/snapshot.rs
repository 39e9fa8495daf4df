// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The full stats snapshot broadcast after every store mutation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_clock::{day_key, hour_key, month_key, week_key};
use tally_core::{MeterSettings, UsageBucket};

/// Consistent view of every aggregate at one point in time.
///
/// `today`/`this_hour`/`this_week`/`this_month` are resolved against the
/// store's time source when the snapshot is taken; absent buckets appear as
/// zero buckets so consumers never need key arithmetic.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub session: UsageBucket,
    pub session_started: DateTime<Utc>,
    pub all_time: UsageBucket,
    pub today: UsageBucket,
    pub this_hour: UsageBucket,
    pub this_week: UsageBucket,
    pub this_month: UsageBucket,
    pub by_day: BTreeMap<String, UsageBucket>,
    pub by_hour: BTreeMap<String, UsageBucket>,
    pub by_week: BTreeMap<String, UsageBucket>,
    pub by_month: BTreeMap<String, UsageBucket>,
    pub by_chat: BTreeMap<String, UsageBucket>,
    pub by_model: BTreeMap<String, UsageBucket>,
    pub by_source: BTreeMap<String, UsageBucket>,
}

pub(crate) fn build_snapshot(settings: &MeterSettings, now: DateTime<Utc>) -> StatsSnapshot {
    let usage = &settings.usage;
    let pick = |map: &BTreeMap<String, UsageBucket>, key: &str| {
        map.get(key).cloned().unwrap_or_default()
    };

    StatsSnapshot {
        session: usage.session.clone(),
        session_started: usage.session_started,
        all_time: usage.all_time.clone(),
        today: pick(&usage.by_day, &day_key(now)),
        this_hour: pick(&usage.by_hour, &hour_key(now)),
        this_week: pick(&usage.by_week, &week_key(now)),
        this_month: pick(&usage.by_month, &month_key(now)),
        by_day: usage.by_day.clone(),
        by_hour: usage.by_hour.clone(),
        by_week: usage.by_week.clone(),
        by_month: usage.by_month.clone(),
        by_chat: usage.by_chat.clone(),
        by_model: usage.by_model.clone(),
        by_source: usage.by_source.clone(),
    }
}
