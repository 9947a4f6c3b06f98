//! API error taxonomy and HTTP mapping
//!
//! Webhook replays and ignored event types are NOT errors; they acknowledge
//! with 200 so provider-side retries stop. Everything here is a genuine
//! caller-facing failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use clearcut_billing::BillingError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad or missing webhook signature
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Unparseable payload or missing required header
    #[error("{0}")]
    BadRequest(String),

    /// Free quota and paid credits both exhausted
    #[error("daily free limit reached")]
    QuotaExhausted {
        reset_at: i64,
        daily_limit: u32,
        upgrade_url: String,
    },

    /// Payment provider or removal engine failure
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// Required configuration absent for this operation
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::SignatureInvalid => ApiError::Authentication(err.to_string()),
            BillingError::MalformedPayload(msg) => ApiError::BadRequest(msg),
            BillingError::UnknownProduct(sku) => {
                ApiError::BadRequest(format!("invalid product sku: {sku}"))
            }
            BillingError::NotConfigured(msg) => ApiError::NotConfigured(msg),
            BillingError::Provider(msg) => ApiError::Upstream(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Authentication(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "authentication_failed", "message": msg }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "bad_request", "message": msg }),
            ),
            ApiError::QuotaExhausted {
                reset_at,
                daily_limit,
                upgrade_url,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "rate_limit_exceeded",
                    "message": format!("Daily limit of {daily_limit} free uses reached"),
                    "reset_at": reset_at,
                    "upgrade_url": upgrade_url,
                }),
            ),
            ApiError::Upstream(msg) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "upstream_unavailable", "message": msg }),
            ),
            ApiError::NotConfigured(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "not_configured", "message": msg }),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal_error", "message": "internal error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
