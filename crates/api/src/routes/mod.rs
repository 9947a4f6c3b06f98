//! HTTP routes

pub mod health;
pub mod payment;
pub mod remove_bg;
pub mod usage;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;

use crate::error::ApiError;
use crate::metrics::render_metrics;
use crate::state::AppState;

/// Header carrying the caller's device fingerprint
pub const DEVICE_ID_HEADER: &str = "x-device-id";

pub fn create_router(state: AppState) -> Router {
    // Axum's default 2 MB body cap would reject uploads the handler is meant
    // to accept. Raise it above the configured file cap, with headroom for
    // multipart framing; the handler enforces the real per-file limit.
    let body_limit = state.config.max_file_size_bytes() + 1024 * 1024;

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(render_metrics))
        .route("/api/v1/usage/quota", get(usage::get_quota))
        .route("/api/v1/remove-bg", post(remove_bg::remove_bg))
        .route(
            "/api/v1/payment/create-checkout",
            post(payment::create_checkout),
        )
        .route("/api/v1/payment/webhook", post(payment::handle_webhook))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Extract the device fingerprint header, required on metered endpoints.
pub(crate) fn require_device_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing X-Device-ID header".to_string()))
}
