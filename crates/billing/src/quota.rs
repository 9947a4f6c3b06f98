//! Free-tier daily quota tracking
//!
//! Each device fingerprint gets `daily_limit` free removals per UTC day.
//! Counters live in an in-process map; `new_in_memory` is the seam where a
//! persistent store would be substituted. Every read-modify-write for a
//! device (lazy create, reset, increment) happens under the map's write lock
//! so concurrent requests around the reset boundary cannot both reset and
//! increment against stale state.

use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use clearcut_shared::{next_utc_midnight, Clock};

/// Per-device usage record
#[derive(Debug, Clone)]
struct DeviceUsage {
    /// Free uses consumed since the last reset
    count: u32,
    /// Next scheduled reset boundary (UTC midnight)
    reset_at: OffsetDateTime,
}

/// Result of a quota check
#[derive(Debug, Clone, Copy)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_at: OffsetDateTime,
}

/// Tracks free daily usage per device fingerprint
#[derive(Clone)]
pub struct QuotaTracker {
    daily_limit: u32,
    clock: Arc<dyn Clock>,
    usage: Arc<RwLock<HashMap<String, DeviceUsage>>>,
}

impl QuotaTracker {
    pub fn new_in_memory(daily_limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            daily_limit,
            clock,
            usage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Check whether a device has free uses remaining.
    ///
    /// Lazily creates the record and rolls the window forward if the reset
    /// boundary has passed, but never consumes a use.
    pub async fn check(&self, device_id: &str) -> QuotaStatus {
        let now = self.clock.now();
        let mut usage = self.usage.write().await;
        let record = Self::current_record(&mut usage, device_id, now);

        let remaining = i64::from(self.daily_limit) - i64::from(record.count);
        QuotaStatus {
            allowed: remaining > 0,
            remaining,
            reset_at: record.reset_at,
        }
    }

    /// Consume one free use and return the remaining allowance.
    ///
    /// Does not enforce the limit; callers are expected to `check` first, so
    /// the return value can go negative under races. Enforcement is the
    /// caller's responsibility.
    pub async fn record(&self, device_id: &str) -> i64 {
        let now = self.clock.now();
        let remaining = {
            let mut usage = self.usage.write().await;
            let record = Self::current_record(&mut usage, device_id, now);
            record.count += 1;
            i64::from(self.daily_limit) - i64::from(record.count)
        };

        metrics::counter!("free_trial_used_total", "tool" => crate::tool_name()).increment(1);
        remaining
    }

    /// Drop records whose reset boundary is more than `ttl` in the past.
    ///
    /// Returns the number of evicted devices. Bounds the otherwise unbounded
    /// device map; a stale record re-created later starts a fresh window, so
    /// eviction never grants extra allowance within a day.
    pub async fn sweep_stale(&self, ttl: Duration) -> usize {
        let now = self.clock.now();
        let mut usage = self.usage.write().await;
        let before = usage.len();
        usage.retain(|_, record| record.reset_at + ttl > now);
        before - usage.len()
    }

    /// Number of devices currently tracked
    pub async fn device_count(&self) -> usize {
        self.usage.read().await.len()
    }

    /// Fetch the record for a device, creating it or rolling the window as
    /// needed. Caller must hold the write lock.
    fn current_record<'a>(
        usage: &'a mut HashMap<String, DeviceUsage>,
        device_id: &str,
        now: OffsetDateTime,
    ) -> &'a mut DeviceUsage {
        let record = usage
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceUsage {
                count: 0,
                reset_at: next_utc_midnight(now),
            });

        if now >= record.reset_at {
            record.count = 0;
            record.reset_at = next_utc_midnight(now);
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearcut_shared::ManualClock;
    use time::macros::datetime;

    fn tracker(limit: u32) -> (QuotaTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 10:00:00 UTC)));
        (QuotaTracker::new_in_memory(limit, clock.clone()), clock)
    }

    #[tokio::test]
    async fn unseen_device_gets_full_allowance() {
        let (tracker, _) = tracker(5);
        let status = tracker.check("d1").await;
        assert!(status.allowed);
        assert_eq!(status.remaining, 5);
        assert_eq!(status.reset_at, datetime!(2025-06-02 00:00:00 UTC));
    }

    #[tokio::test]
    async fn record_counts_down_then_check_denies() {
        let (tracker, _) = tracker(5);
        for expected in [4, 3, 2, 1, 0] {
            assert_eq!(tracker.record("d1").await, expected);
        }
        let status = tracker.check("d1").await;
        assert!(!status.allowed);
        assert_eq!(status.remaining, 0);
    }

    #[tokio::test]
    async fn devices_have_independent_counters() {
        let (tracker, _) = tracker(2);
        tracker.record("d1").await;
        tracker.record("d1").await;
        assert!(!tracker.check("d1").await.allowed);
        assert_eq!(tracker.check("d2").await.remaining, 2);
    }

    #[tokio::test]
    async fn record_past_limit_goes_negative() {
        let (tracker, _) = tracker(1);
        assert_eq!(tracker.record("d1").await, 0);
        assert_eq!(tracker.record("d1").await, -1);
    }

    #[tokio::test]
    async fn reset_boundary_starts_fresh_window() {
        let (tracker, clock) = tracker(3);
        tracker.record("d1").await;
        tracker.record("d1").await;
        let old_reset = tracker.check("d1").await.reset_at;

        clock.advance(Duration::hours(24));

        let status = tracker.check("d1").await;
        assert!(status.allowed);
        assert_eq!(status.remaining, 3);
        assert!(status.reset_at > old_reset);
    }

    #[tokio::test]
    async fn record_also_resets_past_boundary() {
        let (tracker, clock) = tracker(3);
        tracker.record("d1").await;
        tracker.record("d1").await;
        tracker.record("d1").await;

        clock.advance(Duration::days(1));

        // First record of the new window, not the fourth of the old one
        assert_eq!(tracker.record("d1").await, 2);
    }

    #[tokio::test]
    async fn sweep_evicts_only_stale_records() {
        let (tracker, clock) = tracker(5);
        tracker.record("old").await;

        clock.advance(Duration::days(10));
        tracker.record("fresh").await;

        let evicted = tracker.sweep_stale(Duration::days(7)).await;
        assert_eq!(evicted, 1);
        assert_eq!(tracker.device_count().await, 1);

        // Evicted device simply starts over
        assert_eq!(tracker.check("old").await.remaining, 5);
    }
}
