//! Prometheus exposition
//!
//! Installs the global `metrics` recorder and renders it at `/metrics`.
//! Counter names match the dashboards that watched the original deployment
//! (`bg_removal_total`, `payment_webhook_received_total`, ...); the call
//! sites live next to the events they count.

use std::sync::OnceLock;

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at startup, before any metric
/// is emitted; later calls fail.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("file_size_bytes".to_string()),
            &[
                100_000.0,
                500_000.0,
                1_000_000.0,
                5_000_000.0,
                10_000_000.0,
                20_000_000.0,
            ],
        )?
        .install_recorder()?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics recorder already initialized"))?;
    Ok(())
}

/// `GET /metrics`
pub async fn render_metrics() -> impl IntoResponse {
    match METRICS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# metrics recorder not initialized\n".to_string(),
    }
}
