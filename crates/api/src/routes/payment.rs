//! Payment endpoints: checkout creation and the provider webhook
//!
//! The webhook handler must see the raw request bytes; signature
//! verification runs over exactly what arrived on the wire, never a
//! re-serialized form.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use clearcut_billing::{CheckoutRequest, CheckoutSession};

use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the provider's HMAC signature
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// `POST /api/v1/payment/create-checkout`
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    let session = state.billing.checkout.create(&request).await?;
    Ok(Json(session))
}

/// `POST /api/v1/payment/webhook`
///
/// 200 `{"received": true}` for every authenticated, parseable event —
/// applied, replayed, or ignored alike — so the provider stops retrying.
/// Only signature failures (401) and malformed bodies (400) ask for another
/// delivery attempt.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    state.billing.webhooks.process(&body, signature).await?;

    Ok(Json(json!({ "received": true })))
}
