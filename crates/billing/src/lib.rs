// Billing crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Clearcut Billing Module
//!
//! The usage-quota and entitlement core behind the API server.
//!
//! ## Features
//!
//! - **Free Quota**: Per-device daily allowance with UTC-midnight reset
//! - **Entitlements**: Purchased credit packs and unlimited passes
//! - **Webhooks**: Authenticated, exactly-once application of provider events
//! - **Checkout**: Provider checkout-session creation
//! - **Usage Gate**: Entitlement-before-free-quota authorization for requests

pub mod checkout;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod products;
pub mod quota;
pub mod signature;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Checkout
pub use checkout::{CheckoutRequest, CheckoutService, CheckoutSession, PaymentConfig};

// Error
pub use error::{BillingError, BillingResult};

// Gate
pub use gate::{AllowanceSource, Decision, UsageGate};

// Ledger
pub use ledger::{EntitlementBalance, EntitlementLedger};

// Products
pub use products::{Product, ProductCatalog, ProductGrant};

// Quota
pub use quota::{QuotaStatus, QuotaTracker};

// Webhooks
pub use webhooks::{IgnoreReason, WebhookEvent, WebhookOutcome, WebhookProcessor};

use std::sync::{Arc, OnceLock};

use clearcut_shared::Clock;

/// Metric label identifying this deployment (`TOOL_NAME`, default "clearcut")
pub fn tool_name() -> String {
    static TOOL: OnceLock<String> = OnceLock::new();
    TOOL.get_or_init(|| std::env::var("TOOL_NAME").unwrap_or_else(|_| "clearcut".to_string()))
        .clone()
}

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub catalog: Arc<ProductCatalog>,
    pub quota: QuotaTracker,
    pub ledger: EntitlementLedger,
    pub webhooks: WebhookProcessor,
    pub checkout: CheckoutService,
    pub gate: UsageGate,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(daily_limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            daily_limit,
            PaymentConfig::from_env(),
            Arc::new(ProductCatalog::from_env()),
            clock,
        )
    }

    /// Create a new billing service with explicit config
    pub fn new(
        daily_limit: u32,
        payment: PaymentConfig,
        catalog: Arc<ProductCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let quota = QuotaTracker::new_in_memory(daily_limit, clock.clone());
        let ledger = EntitlementLedger::new_in_memory(catalog.clone(), clock.clone());
        let webhooks = WebhookProcessor::new(payment.webhook_secret.clone(), ledger.clone());
        let checkout = CheckoutService::new(payment, catalog.clone());
        let gate = UsageGate::new(quota.clone(), ledger.clone(), clock);

        Self {
            catalog,
            quota,
            ledger,
            webhooks,
            checkout,
            gate,
        }
    }
}
