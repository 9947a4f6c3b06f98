// API crate clippy configuration
// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Clearcut API Library
//!
//! This crate contains the HTTP server components for Clearcut: routing,
//! configuration, error mapping, and the removal-engine client. The quota
//! and entitlement logic lives in `clearcut-billing`.

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
