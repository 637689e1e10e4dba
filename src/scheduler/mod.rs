//! Alert scheduler.
//!
//! Owns the pending alerts, a single re-arming timer and the current focus,
//! and drives every alert through its state machine. At most one alert
//! renders at a time.

pub mod context;
pub mod runner;

pub use context::{AlertContext, AlertsContextInfo};
pub use runner::AlertScheduler;
