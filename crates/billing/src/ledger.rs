//! Entitlement ledger
//!
//! Paid allowance per device: either a credit balance or a time-bounded
//! unlimited window. Grants arrive from verified payment webhooks; consumes
//! happen after a processing request succeeds. Credits never go negative — a
//! consume that would overdraw is rejected, not clamped.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use clearcut_shared::Clock;

use crate::error::{BillingError, BillingResult};
use crate::products::{ProductCatalog, ProductGrant};

/// Snapshot of a device's paid allowance
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntitlementBalance {
    pub credits: i64,
    #[serde(with = "time::serde::timestamp::option")]
    pub unlimited_until: Option<OffsetDateTime>,
}

impl EntitlementBalance {
    pub fn has_active_unlimited(&self, now: OffsetDateTime) -> bool {
        self.unlimited_until.is_some_and(|until| until > now)
    }
}

/// Owns per-device paid balances; grant and consume are each atomic with
/// respect to other operations on the same device.
#[derive(Clone)]
pub struct EntitlementLedger {
    catalog: Arc<ProductCatalog>,
    clock: Arc<dyn Clock>,
    balances: Arc<RwLock<HashMap<String, EntitlementBalance>>>,
}

impl EntitlementLedger {
    pub fn new_in_memory(catalog: Arc<ProductCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            clock,
            balances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Apply a purchase to a device's balance.
    ///
    /// Unknown SKUs are a configuration mismatch between us and the provider
    /// and are rejected; the webhook layer decides how loudly to surface that.
    pub async fn grant(&self, device_id: &str, product_sku: &str) -> BillingResult<EntitlementBalance> {
        let product = self
            .catalog
            .get(product_sku)
            .ok_or_else(|| BillingError::UnknownProduct(product_sku.to_string()))?;

        let now = self.clock.now();
        let mut balances = self.balances.write().await;
        let balance = balances.entry(device_id.to_string()).or_default();

        match product.grant {
            ProductGrant::Credits { amount } => {
                balance.credits += amount;
            }
            ProductGrant::Unlimited { days } => {
                // Renewals extend from the end of the current window, not from now
                let base = balance
                    .unlimited_until
                    .filter(|until| *until > now)
                    .unwrap_or(now);
                balance.unlimited_until = Some(base + Duration::days(days));
            }
        }

        metrics::counter!(
            "credits_granted_total",
            "tool" => crate::tool_name(),
            "product_sku" => product.sku.clone()
        )
        .increment(1);

        tracing::info!(
            device_id = %device_id,
            product_sku = %product_sku,
            credits = balance.credits,
            unlimited_until = ?balance.unlimited_until,
            "Entitlement granted"
        );

        Ok(balance.clone())
    }

    /// Consume paid allowance.
    ///
    /// Returns `false` without mutation when there is neither an active
    /// unlimited window nor enough credits. An active unlimited window
    /// satisfies the consume without touching the credit balance.
    pub async fn consume(&self, device_id: &str, amount: i64) -> bool {
        let now = self.clock.now();
        let mut balances = self.balances.write().await;
        let Some(balance) = balances.get_mut(device_id) else {
            return false;
        };

        if !balance.has_active_unlimited(now) {
            if balance.credits < amount {
                return false;
            }
            balance.credits -= amount;
            // Only an actual decrement counts as burn; unlimited-window
            // consumes leave the balance alone
            metrics::counter!("credits_consumed_total", "tool" => crate::tool_name())
                .increment(amount.max(0) as u64);
        }

        true
    }

    /// Read-only snapshot; unknown devices report an empty balance.
    pub async fn balance(&self, device_id: &str) -> EntitlementBalance {
        self.balances
            .read()
            .await
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }
}
