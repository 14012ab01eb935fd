// ============================================
// File: crates/dnsfleet-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Wall-clock timestamps for values that leave the process (health records,
//! auth status) and jitter for periodic loops.
//!
//! ## Main Functionality
//! - `Timestamp`: Unix timestamp in milliseconds, serialized as a number
//! - `jitter`: Spreads a period by a symmetric random fraction
//!
//! ## ⚠️ Important Note for Next Developer
//! - Expiry logic (sessions, cursors, grace timers) must use monotonic
//!   `Instant`s, not `Timestamp`. `Timestamp` is for reporting only.
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================
// Timestamp
// ============================================

/// Unix timestamp in milliseconds.
///
/// # Example
/// ```
/// use dnsfleet_common::time::Timestamp;
/// use std::time::Duration;
///
/// let now = Timestamp::now();
/// let later = now.saturating_add(Duration::from_secs(2));
/// assert_eq!(later.as_millis() - now.as_millis(), 2000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from Unix milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Creates a timestamp for the current time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    /// Returns the Unix timestamp in milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns the Unix timestamp in whole seconds.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0 / 1000
    }

    /// Returns this timestamp moved forward by `d`, saturating on overflow.
    #[must_use]
    pub fn saturating_add(&self, d: Duration) -> Self {
        let millis = i64::try_from(d.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================
// Jitter
// ============================================

/// Returns `period` spread uniformly over `[period * (1 - fraction), period * (1 + fraction)]`.
///
/// `fraction` is clamped to `[0, 1]`. A zero period is returned unchanged.
#[must_use]
pub fn jitter(period: Duration, fraction: f64) -> Duration {
    let fraction = fraction.clamp(0.0, 1.0);
    if period.is_zero() || fraction == 0.0 {
        return period;
    }
    let factor = rand::thread_rng().gen_range((1.0 - fraction)..=(1.0 + fraction));
    period.mul_f64(factor)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now_is_recent() {
        let ts = Timestamp::now();
        // 2020-01-01 in millis
        assert!(ts.as_millis() > 1_577_836_800_000);
        assert_eq!(ts.as_secs(), ts.as_millis() / 1000);
    }

    #[test]
    fn test_timestamp_saturating_add() {
        let ts = Timestamp::from_millis(i64::MAX - 10);
        assert_eq!(ts.saturating_add(Duration::from_secs(1)).as_millis(), i64::MAX);
    }

    #[test]
    fn test_jitter_bounds() {
        let period = Duration::from_secs(5);
        for _ in 0..1000 {
            let d = jitter(period, 0.2);
            assert!(d >= Duration::from_millis(3_999));
            assert!(d <= Duration::from_millis(6_001));
        }
    }

    #[test]
    fn test_jitter_degenerate_inputs() {
        assert_eq!(jitter(Duration::ZERO, 0.2), Duration::ZERO);
        assert_eq!(jitter(Duration::from_secs(3), 0.0), Duration::from_secs(3));
    }
}
