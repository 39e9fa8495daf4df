// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The time source used for all bucket-key computation.
//!
//! A [`TimeSource`] is either the system clock plus a correction offset
//! (updated by reference-clock resync) or a host-controlled fixed clock,
//! which tests and embedded hosts use for deterministic bucketing.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

enum Inner {
    /// System clock corrected by `offset_ms` (reference minus system).
    System { offset_ms: AtomicI64 },
    /// Host-controlled clock, advanced explicitly.
    Fixed { at: Mutex<DateTime<Utc>> },
}

/// Supplies the "current time" for every ledger write.
///
/// Reads never block and never fail; resync only ever adjusts the offset.
pub struct TimeSource {
    inner: Inner,
}

impl TimeSource {
    /// System clock with zero initial correction.
    pub fn system() -> Self {
        Self {
            inner: Inner::System {
                offset_ms: AtomicI64::new(0),
            },
        }
    }

    /// Fixed clock pinned at `at` until explicitly advanced.
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self {
            inner: Inner::Fixed { at: Mutex::new(at) },
        }
    }

    /// The corrected current time.
    pub fn now(&self) -> DateTime<Utc> {
        match &self.inner {
            Inner::System { offset_ms } => {
                Utc::now() + Duration::milliseconds(offset_ms.load(Ordering::Relaxed))
            }
            Inner::Fixed { at } => *at.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    /// Apply a reference reading: future `now()` calls are shifted so they
    /// agree with the reference. No-op for fixed clocks.
    pub fn apply_reference(&self, reference_now: DateTime<Utc>) {
        if let Inner::System { offset_ms } = &self.inner {
            let offset = (reference_now - Utc::now()).num_milliseconds();
            offset_ms.store(offset, Ordering::Relaxed);
            debug!(offset_ms = offset, "applied reference clock correction");
        }
    }

    /// Current correction offset.
    pub fn offset(&self) -> Duration {
        match &self.inner {
            Inner::System { offset_ms } => {
                Duration::milliseconds(offset_ms.load(Ordering::Relaxed))
            }
            Inner::Fixed { .. } => Duration::zero(),
        }
    }

    /// Move a fixed clock to `at`. Ignored for system clocks.
    pub fn set_fixed(&self, at: DateTime<Utc>) {
        if let Inner::Fixed { at: slot } = &self.inner {
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_clock_starts_uncorrected() {
        let time = TimeSource::system();
        assert_eq!(time.offset(), Duration::zero());
        let delta = (time.now() - Utc::now()).num_milliseconds().abs();
        assert!(delta < 1_000, "uncorrected now() should track the system clock");
    }

    #[test]
    fn apply_reference_shifts_now() {
        let time = TimeSource::system();
        let reference = Utc::now() + Duration::hours(2);
        time.apply_reference(reference);

        let offset = time.offset().num_minutes();
        assert!((119..=121).contains(&offset), "offset should be ~2h, got {offset}m");

        let delta = (time.now() - reference).num_seconds().abs();
        assert!(delta < 2, "corrected now() should agree with the reference");
    }

    #[test]
    fn fixed_clock_is_pinned_and_advanceable() {
        let start = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        let time = TimeSource::fixed(start);
        assert_eq!(time.now(), start);

        // Reference corrections never move a fixed clock.
        time.apply_reference(Utc::now());
        assert_eq!(time.now(), start);

        let later = start + Duration::hours(3);
        time.set_fixed(later);
        assert_eq!(time.now(), later);
    }
}
