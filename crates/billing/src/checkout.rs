//! Checkout session creation
//!
//! Thin pass-through to the payment provider's checkout API. We attach the
//! device fingerprint and SKU as metadata so the completion webhook can be
//! correlated back to the buyer.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};
use crate::products::ProductCatalog;

const LIVE_API_BASE: &str = "https://api.creem.io";
const TEST_API_BASE: &str = "https://test-api.creem.io";
const TEST_KEY_PREFIX: &str = "creem_test_";

/// Payment provider credentials and endpoints
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub api_key: String,
    pub webhook_secret: String,
    pub api_base: String,
}

impl PaymentConfig {
    /// Load from `PAYMENT_API_KEY` / `PAYMENT_WEBHOOK_SECRET`, with an
    /// optional `PAYMENT_API_BASE` override. Test-mode keys route to the
    /// provider's test environment automatically.
    pub fn from_env() -> Self {
        let api_key = std::env::var("PAYMENT_API_KEY").unwrap_or_default();
        let webhook_secret = std::env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_default();
        let api_base = std::env::var("PAYMENT_API_BASE").unwrap_or_else(|_| {
            if api_key.starts_with(TEST_KEY_PREFIX) {
                TEST_API_BASE.to_string()
            } else {
                LIVE_API_BASE.to_string()
            }
        });

        Self {
            api_key,
            webhook_secret,
            api_base,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub product_sku: String,
    pub device_id: String,
    pub success_url: String,
    pub cancel_url: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub checkout_id: String,
}

#[derive(Debug, Serialize)]
struct ProviderCheckoutBody<'a> {
    product_id: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
    metadata: ProviderMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct ProviderMetadata<'a> {
    device_id: &'a str,
    product_sku: &'a str,
    tool: String,
}

#[derive(Debug, Deserialize)]
struct ProviderCheckoutResponse {
    id: String,
    checkout_url: String,
}

/// Creates provider checkout sessions for catalog products.
#[derive(Clone)]
pub struct CheckoutService {
    config: PaymentConfig,
    catalog: Arc<ProductCatalog>,
    http: reqwest::Client,
}

impl CheckoutService {
    pub fn new(config: PaymentConfig, catalog: Arc<ProductCatalog>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            config,
            catalog,
            http,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Create a checkout session, returning the URL the buyer is sent to.
    pub async fn create(&self, request: &CheckoutRequest) -> BillingResult<CheckoutSession> {
        if !self.config.is_configured() {
            return Err(BillingError::NotConfigured("payment api key missing".into()));
        }

        let product = self
            .catalog
            .get(&request.product_sku)
            .ok_or_else(|| BillingError::UnknownProduct(request.product_sku.clone()))?;

        let provider_product_id = product.provider_product_id.as_deref().ok_or_else(|| {
            BillingError::NotConfigured(format!(
                "no provider product id for sku {}",
                product.sku
            ))
        })?;

        let body = ProviderCheckoutBody {
            product_id: provider_product_id,
            success_url: &request.success_url,
            cancel_url: &request.cancel_url,
            metadata: ProviderMetadata {
                device_id: &request.device_id,
                product_sku: &product.sku,
                tool: crate::tool_name(),
            },
        };

        let response = self
            .http
            .post(format!("{}/v1/checkouts", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let session: ProviderCheckoutResponse = response
            .json()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        metrics::counter!(
            "payment_checkout_created_total",
            "tool" => crate::tool_name(),
            "product_sku" => product.sku.clone()
        )
        .increment(1);

        tracing::info!(
            checkout_id = %session.id,
            product_sku = %product.sku,
            device_id = %request.device_id,
            "Checkout session created"
        );

        Ok(CheckoutSession {
            checkout_url: session.checkout_url,
            checkout_id: session.id,
        })
    }
}
