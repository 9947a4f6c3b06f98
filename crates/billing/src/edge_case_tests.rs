// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Quota & Entitlement Core
//!
//! Tests critical boundary conditions and race conditions in:
//! - Free quota windows (reset boundary, concurrent increments)
//! - Webhook idempotency under concurrent redelivery
//! - Entitlement consumption races
//! - End-to-end gate behavior across a clock boundary

#[cfg(test)]
mod quota_boundary_tests {
    use std::sync::Arc;

    use clearcut_shared::ManualClock;
    use time::macros::datetime;
    use time::Duration;
    use tokio::sync::Barrier;

    use crate::quota::QuotaTracker;

    // =========================================================================
    // Concurrent records for one device around the limit: counter stays exact
    // =========================================================================
    #[tokio::test]
    async fn concurrent_records_count_exactly() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 10:00:00 UTC)));
        let tracker = Arc::new(QuotaTracker::new_in_memory(100, clock));

        let barrier = Arc::new(Barrier::new(20));
        let mut handles = vec![];

        for _ in 0..20 {
            let tracker = Arc::clone(&tracker);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                tracker.record("d1").await
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        // 20 increments, no lost updates
        let status = tracker.check("d1").await;
        assert_eq!(status.remaining, 80);
    }

    // =========================================================================
    // Concurrent requests straddling the reset boundary: the window resets
    // once and all increments land in the fresh window
    // =========================================================================
    #[tokio::test]
    async fn concurrent_requests_at_reset_boundary() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 10:00:00 UTC)));
        let tracker = Arc::new(QuotaTracker::new_in_memory(5, clock.clone()));

        // Exhaust the old window
        for _ in 0..5 {
            tracker.record("d1").await;
        }
        assert!(!tracker.check("d1").await.allowed);

        // Cross the boundary, then hammer it concurrently
        clock.advance(Duration::days(1));

        let barrier = Arc::new(Barrier::new(3));
        let mut handles = vec![];
        for _ in 0..3 {
            let tracker = Arc::clone(&tracker);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                tracker.record("d1").await
            }));
        }

        let mut remainings: Vec<i64> = vec![];
        for handle in handles {
            remainings.push(handle.await.unwrap());
        }
        remainings.sort_unstable();

        // Exactly one reset happened: three distinct countdown values
        assert_eq!(remainings, vec![2, 3, 4]);
    }

    // =========================================================================
    // check never consumes: any number of checks leaves remaining untouched
    // =========================================================================
    #[tokio::test]
    async fn check_is_read_only() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 10:00:00 UTC)));
        let tracker = QuotaTracker::new_in_memory(5, clock);

        for _ in 0..50 {
            tracker.check("d1").await;
        }
        assert_eq!(tracker.check("d1").await.remaining, 5);
    }
}

#[cfg(test)]
mod webhook_replay_tests {
    use std::sync::Arc;

    use clearcut_shared::ManualClock;
    use time::macros::datetime;
    use tokio::sync::Barrier;

    use crate::ledger::EntitlementLedger;
    use crate::products::ProductCatalog;
    use crate::signature;
    use crate::webhooks::{WebhookOutcome, WebhookProcessor, CHECKOUT_COMPLETED};

    const SECRET: &str = "whsec_race";

    fn processor() -> (Arc<WebhookProcessor>, EntitlementLedger) {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 10:00:00 UTC)));
        let catalog = Arc::new(ProductCatalog::builtin());
        let ledger = EntitlementLedger::new_in_memory(catalog, clock);
        (
            Arc::new(WebhookProcessor::new(SECRET.to_string(), ledger.clone())),
            ledger,
        )
    }

    // =========================================================================
    // N concurrent deliveries of one event: exactly one grant lands
    // =========================================================================
    #[tokio::test]
    async fn concurrent_redelivery_applies_once() {
        let (processor, ledger) = processor();
        let payload = serde_json::json!({
            "id": "evt_race",
            "type": CHECKOUT_COMPLETED,
            "data": {
                "amount": 299,
                "currency": "USD",
                "metadata": { "device_id": "d9", "product_sku": "starter_50" }
            }
        })
        .to_string()
        .into_bytes();
        let sig = signature::sign(&payload, SECRET).unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let mut handles = vec![];
        for _ in 0..8 {
            let processor = Arc::clone(&processor);
            let barrier = Arc::clone(&barrier);
            let payload = payload.clone();
            let sig = sig.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                processor.process(&payload, Some(&sig)).await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() == WebhookOutcome::Applied {
                applied += 1;
            }
        }

        assert_eq!(applied, 1, "Exactly one delivery may apply the grant");
        assert_eq!(ledger.balance("d9").await.credits, 50);
    }
}

#[cfg(test)]
mod entitlement_race_tests {
    use std::sync::Arc;

    use clearcut_shared::ManualClock;
    use time::macros::datetime;
    use tokio::sync::Barrier;

    use crate::ledger::EntitlementLedger;
    use crate::products::ProductCatalog;

    // =========================================================================
    // Concurrent consumes never overdraw: successes == starting balance
    // =========================================================================
    #[tokio::test]
    async fn concurrent_consumes_respect_balance() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 10:00:00 UTC)));
        let catalog = Arc::new(ProductCatalog::builtin());
        let ledger = Arc::new(EntitlementLedger::new_in_memory(catalog, clock));

        ledger.grant("d1", "starter_50").await.unwrap();

        let barrier = Arc::new(Barrier::new(60));
        let mut handles = vec![];
        for _ in 0..60 {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                ledger.consume("d1", 1).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 50, "Only 50 consumes may succeed");
        assert_eq!(ledger.balance("d1").await.credits, 0);
    }
}

#[cfg(test)]
mod gate_boundary_tests {
    use std::sync::Arc;

    use clearcut_shared::ManualClock;
    use time::macros::datetime;
    use time::Duration;

    use crate::gate::{AllowanceSource, UsageGate};
    use crate::ledger::EntitlementLedger;
    use crate::products::ProductCatalog;
    use crate::quota::QuotaTracker;

    fn gate(daily_limit: u32) -> (UsageGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 23:59:00 UTC)));
        let catalog = Arc::new(ProductCatalog::builtin());
        let quota = QuotaTracker::new_in_memory(daily_limit, clock.clone());
        let ledger = EntitlementLedger::new_in_memory(catalog, clock.clone());
        (UsageGate::new(quota, ledger, clock.clone()), clock)
    }

    // =========================================================================
    // Free tier exhausted just before midnight recovers just after
    // =========================================================================
    #[tokio::test]
    async fn exhaustion_clears_across_midnight() {
        let (gate, clock) = gate(2);
        for _ in 0..2 {
            let decision = gate.authorize("d1").await;
            assert!(decision.allowed);
            gate.commit("d1", decision.source).await;
        }
        assert!(!gate.authorize("d1").await.allowed);

        clock.advance(Duration::minutes(2));

        let decision = gate.authorize("d1").await;
        assert!(decision.allowed);
        assert_eq!(decision.source, AllowanceSource::FreeQuota);
        assert_eq!(decision.remaining, 2);
    }

    // =========================================================================
    // Unlimited expiry mid-day flips the source back to credits / free tier
    // =========================================================================
    #[tokio::test]
    async fn unlimited_expiry_changes_source() {
        let (gate, clock) = gate(5);
        gate.ledger().grant("d1", "unlimited_monthly").await.unwrap();
        assert_eq!(
            gate.authorize("d1").await.source,
            AllowanceSource::Entitlement
        );

        clock.advance(Duration::days(31));

        assert_eq!(
            gate.authorize("d1").await.source,
            AllowanceSource::FreeQuota
        );
    }
}
