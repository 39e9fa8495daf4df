// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bucket-key computation.
//!
//! All keys are computed in UTC so aggregation is stable regardless of where
//! the meter runs. Week keys follow ISO-8601: week 1 is the week containing
//! the year's first Thursday, weeks run Monday through Sunday.

use chrono::{DateTime, Datelike, Utc};

/// Day key, `YYYY-MM-DD`.
pub fn day_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Hour key, `YYYY-MM-DDTHH`.
pub fn hour_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H").to_string()
}

/// ISO-8601 week key, `YYYY-Www`. The year is the ISO week year, which can
/// differ from the calendar year near year boundaries.
pub fn week_key(at: DateTime<Utc>) -> String {
    let week = at.iso_week();
    format!("{:04}-W{:02}", week.year(), week.week())
}

/// Month key, `YYYY-MM`.
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}
