//! Health and service-info endpoints

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: String,
}

/// `GET /`
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": state.config.app_name,
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/docs",
    }))
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: state.config.app_name.clone(),
    })
}

/// `GET /ready`
pub async fn readiness_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready",
        version: env!("CARGO_PKG_VERSION"),
        service: state.config.app_name.clone(),
    })
}
