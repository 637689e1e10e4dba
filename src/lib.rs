//! Fae alerts: alarms, timers and reminders.
//!
//! The [`AlertScheduler`] keeps every pending alert in memory and in a
//! persistent store, arms a single timer for the earliest one, and hands
//! alerts one at a time to a host [`Renderer`] when the host grants focus.
//!
//! # Architecture
//!
//! - **alert**: the alert entity and its state machine
//! - **storage**: persistence behind [`AlertStorage`] (SQLite and in-memory)
//! - **timer**: the re-arming countdown that signals the next due alert
//! - **scheduler**: orchestration, focus handling and crash recovery
//! - **observer**: lifecycle events delivered to the host

pub mod alert;
pub mod clock;
pub mod config;
mod dispatch;
pub mod error;
pub mod fae_dirs;
pub mod observer;
pub mod renderer;
pub mod scheduler;
pub mod storage;
pub mod timer;

#[cfg(test)]
mod test_utils;

pub use alert::{Alert, AlertRecord, AlertState, AlertType, FocusState, StopReason};
pub use config::AlertsConfig;
pub use error::{AlertsError, Result};
pub use observer::{AlertEvent, AlertInfo, AlertObserver};
pub use renderer::{RenderCommand, Renderer, RendererState};
pub use scheduler::{AlertScheduler, AlertsContextInfo};
pub use storage::{AlertStorage, MemoryAlertStorage, SqliteAlertStorage};
