// ============================================
// File: crates/rootlink-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Trust records remember when a peer was first trusted, stored as Unix
//! seconds so the JSON store stays readable.
//!
//! ## Main Functionality
//! - `Timestamp`: Unix timestamp in seconds, serde-transparent
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// Timestamp
// ============================================

/// Unix timestamp in seconds.
///
/// # Example
/// ```
/// use rootlink_common::time::Timestamp;
///
/// let earlier = Timestamp::from_secs(1_700_000_000);
/// assert!(Timestamp::now() > earlier);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a new timestamp from Unix seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Creates a timestamp for the current time.
    ///
    /// A system clock set before the epoch yields `0` rather than panicking.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
        Self(secs)
    }

    /// Returns the Unix timestamp in seconds.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now_is_monotone_enough() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b >= a);
        assert!(a.as_secs() > 1_577_836_800);
    }

    #[test]
    fn test_timestamp_serde_transparent() {
        let ts = Timestamp::from_secs(1_700_000_000);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1700000000");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
