//! Clearcut API Server
//!
//! Metered background-removal service: free daily quota per device
//! fingerprint, purchasable entitlement via the payment provider, usage and
//! payment state served by the billing core.

use std::net::SocketAddr;

use axum::http::{header, HeaderName, Method};
use time::Duration as TimeDuration;
use tokio::time::{interval, Duration};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clearcut_api::{routes::create_router, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,clearcut_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Clearcut API Server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    tracing::info!(
        free_daily_limit = config.free_daily_limit,
        max_file_size_mb = config.max_file_size_mb,
        "Configuration loaded"
    );

    clearcut_api::metrics::init_metrics()?;
    tracing::info!("Metrics recorder installed");

    let state = AppState::new(config.clone());

    // Hourly sweep keeps the device map bounded; evicted devices simply
    // start a fresh window on their next request
    let quota = state.billing.quota.clone();
    let ttl_days = config.usage_record_ttl_days;
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(3600));
        interval.tick().await; // Skip the immediate first tick

        loop {
            interval.tick().await;
            let evicted = quota.sweep_stale(TimeDuration::days(ttl_days)).await;
            if evicted > 0 {
                tracing::info!(evicted = evicted, "Swept stale device usage records");
            }
        }
    });
    tracing::info!("Usage record sweeper started (ttl: {} days)", ttl_days);

    // CORS: explicit origin allowlist; the quota headers must be readable
    // by the frontend
    let allowed_origins: Vec<axum::http::HeaderValue> = config
        .allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    tracing::info!(
        allowed_origins = ?allowed_origins,
        "CORS configured with {} allowed origins",
        allowed_origins.len()
    );

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-device-id"),
        ])
        .expose_headers([
            HeaderName::from_static("x-remaining-uses"),
            HeaderName::from_static("x-daily-limit"),
        ]);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
