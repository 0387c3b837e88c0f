//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

use chrono::{DateTime, Utc};

/// Account ID - globally unique, immutable after assignment.
///
/// # Usage:
/// - Primary key for user accounts (`accounts_tb.account_id`)
/// - `sub` claim of issued JWTs
/// - Key of the session registry and of cache entries
pub type AccountId = i64;

/// Amount in currency minor units (cents).
///
/// Never a float: every balance mutation is integer arithmetic.
pub type MinorUnits = u64;

/// Wall-clock timestamp (UTC)
pub type Timestamp = DateTime<Utc>;

/// Number of decimal places of the ledger currency
pub const CURRENCY_DECIMALS: u32 = 2;

/// Source of "now" for every expiry decision.
///
/// The transaction core never calls `Utc::now()` directly so that token
/// expiry can be driven deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Production clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::minutes(21));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(21));
    }
}
