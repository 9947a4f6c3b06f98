//! Time source abstraction
//!
//! Quota windows reset at UTC midnight, so the reset boundary math lives here
//! next to the clock that drives it. Handlers take a `Clock` rather than
//! calling `OffsetDateTime::now_utc()` directly so tests can step time across
//! the reset boundary deterministically.

use std::sync::RwLock;
use time::{Date, Duration, OffsetDateTime};

/// Source of "now" for quota and entitlement decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually-advanced clock for tests
pub struct ManualClock {
    now: RwLock<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }

    pub fn set(&self, to: OffsetDateTime) {
        let mut now = self.now.write().unwrap_or_else(|p| p.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.read().unwrap_or_else(|p| p.into_inner())
    }
}

/// First UTC midnight strictly after `now`
pub fn next_utc_midnight(now: OffsetDateTime) -> OffsetDateTime {
    let utc = now.to_offset(time::UtcOffset::UTC);
    // next_day() is None only at Date::MAX, far beyond any real deployment
    let tomorrow = utc.date().next_day().unwrap_or(Date::MAX);
    tomorrow.midnight().assume_utc()
}
