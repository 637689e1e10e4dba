//! Integration test binary -- all integration tests consolidated into a single
//! binary to reduce link-time RAM usage.

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod helpers;

mod alerts_config_roundtrip;
mod alerts_recovery;
mod alerts_scheduler_flow;
