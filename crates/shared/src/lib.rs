#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Clearcut Shared Library
//!
//! Types shared between the API server and the billing core.

pub mod clock;

pub use clock::{next_utc_midnight, Clock, ManualClock, SystemClock};
