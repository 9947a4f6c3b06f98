//! Billing error types

use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Webhook signature missing or failed verification
    #[error("webhook signature verification failed")]
    SignatureInvalid,

    /// Webhook body was not a valid event envelope
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// SKU not present in the product catalog
    #[error("unknown product sku: {0}")]
    UnknownProduct(String),

    /// Payment provider credentials or product mapping absent
    #[error("payment provider not configured: {0}")]
    NotConfigured(String),

    /// Payment provider API call failed
    #[error("payment provider error: {0}")]
    Provider(String),
}
