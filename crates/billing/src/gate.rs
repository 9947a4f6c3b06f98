//! Usage gate
//!
//! Composition point the API layer talks to. Paid entitlement is checked
//! before the free quota — a paying user draws down purchased credits before
//! hearing about the free tier. Nothing is charged at authorize time; the
//! caller commits only after the guarded operation has succeeded, so a
//! failed or cancelled request never consumes allowance.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use clearcut_shared::Clock;

use crate::ledger::EntitlementLedger;
use crate::quota::QuotaTracker;

/// Which allowance pool a request draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowanceSource {
    Entitlement,
    FreeQuota,
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_at: OffsetDateTime,
    pub source: AllowanceSource,
}

#[derive(Clone)]
pub struct UsageGate {
    quota: QuotaTracker,
    ledger: EntitlementLedger,
    clock: Arc<dyn Clock>,
}

impl UsageGate {
    pub fn new(quota: QuotaTracker, ledger: EntitlementLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            quota,
            ledger,
            clock,
        }
    }

    /// Decide whether a device may run one operation right now.
    ///
    /// Read-only apart from the quota tracker's lazy create/reset.
    pub async fn authorize(&self, device_id: &str) -> Decision {
        let now = self.clock.now();
        let quota = self.quota.check(device_id).await;
        let balance = self.ledger.balance(device_id).await;

        if balance.has_active_unlimited(now) {
            // Unlimited window: report the free-tier numbers but always allow
            return Decision {
                allowed: true,
                remaining: quota.remaining.max(0),
                reset_at: quota.reset_at,
                source: AllowanceSource::Entitlement,
            };
        }

        if balance.credits > 0 {
            return Decision {
                allowed: true,
                remaining: balance.credits,
                reset_at: quota.reset_at,
                source: AllowanceSource::Entitlement,
            };
        }

        Decision {
            allowed: quota.allowed,
            remaining: quota.remaining,
            reset_at: quota.reset_at,
            source: AllowanceSource::FreeQuota,
        }
    }

    /// Charge one successful operation against the pool chosen at authorize
    /// time. Returns the remaining allowance in that pool.
    pub async fn commit(&self, device_id: &str, source: AllowanceSource) -> i64 {
        match source {
            AllowanceSource::Entitlement => {
                if self.ledger.consume(device_id, 1).await {
                    let balance = self.ledger.balance(device_id).await;
                    if balance.has_active_unlimited(self.clock.now()) {
                        // Unlimited consumes leave credits alone; report the
                        // free-tier numbers like authorize does
                        self.quota.check(device_id).await.remaining.max(0)
                    } else {
                        balance.credits
                    }
                } else {
                    // Credits raced away between authorize and commit; the
                    // operation already ran, so charge the free tier instead
                    tracing::warn!(
                        device_id = %device_id,
                        "Entitlement consumed concurrently - falling back to free quota"
                    );
                    self.quota.record(device_id).await
                }
            }
            AllowanceSource::FreeQuota => self.quota.record(device_id).await,
        }
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn ledger(&self) -> &EntitlementLedger {
        &self.ledger
    }
}
