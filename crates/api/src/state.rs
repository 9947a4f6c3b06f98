//! Application state

use std::sync::Arc;

use clearcut_billing::BillingService;
use clearcut_shared::SystemClock;

use crate::config::Config;
use crate::engine::RemovalEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub billing: Arc<BillingService>,
    pub engine: RemovalEngine,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let billing = Arc::new(BillingService::from_env(
            config.free_daily_limit,
            Arc::new(SystemClock),
        ));

        if billing.checkout.is_configured() {
            tracing::info!("Payment provider configured");
        } else {
            tracing::warn!("Payment provider not configured (missing PAYMENT_API_KEY) - checkout disabled");
        }

        let engine = RemovalEngine::new(config.removal_engine_url.clone());
        if engine.is_configured() {
            tracing::info!(url = %config.removal_engine_url, "Removal engine configured");
        } else {
            tracing::warn!("Removal engine not configured (missing REMOVAL_ENGINE_URL)");
        }

        Self {
            config,
            billing,
            engine,
        }
    }

    /// State with an explicit billing service, for tests
    pub fn with_billing(config: Config, billing: Arc<BillingService>) -> Self {
        let engine = RemovalEngine::new(config.removal_engine_url.clone());
        Self {
            config,
            billing,
            engine,
        }
    }
}
