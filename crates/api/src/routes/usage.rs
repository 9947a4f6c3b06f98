//! Quota status endpoint

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::ApiResult;
use crate::routes::require_device_id;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct QuotaResponse {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_at: i64,
    pub daily_limit: u32,
}

/// `GET /api/v1/usage/quota`
///
/// Reports the combined allowance for the calling device: paid credits or an
/// active unlimited window take priority, then the free daily quota. Never
/// consumes anything.
pub async fn get_quota(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<QuotaResponse>> {
    let device_id = require_device_id(&headers)?;
    let decision = state.billing.gate.authorize(device_id).await;

    Ok(Json(QuotaResponse {
        allowed: decision.allowed,
        remaining: decision.remaining,
        reset_at: decision.reset_at.unix_timestamp(),
        daily_limit: state.billing.quota.daily_limit(),
    }))
}
