//! Durable alert storage.
//!
//! The scheduler owns exactly one [`AlertStorage`] and calls it while
//! holding its lock, so implementations need not be internally synchronised.

mod memory;
mod retry;
mod schema;
mod sqlite;

pub use memory::{MemoryAlertStorage, StorageOp};
pub use retry::{RetryPolicy, backoff};
pub use sqlite::SqliteAlertStorage;

use crate::alert::{AlertRecord, OfflineStoppedAlert};
use crate::error::Result;

/// Persistence contract for alerts.
pub trait AlertStorage: Send {
    /// Open an existing store.
    ///
    /// A store that is missing or cannot hold alerts fails with
    /// [`AlertsError::StorageUnusable`](crate::error::AlertsError::StorageUnusable).
    /// Any other error (busy, locked, I/O) leaves the store untouched.
    fn open(&mut self) -> Result<()>;

    /// Create a fresh, empty store. Never replaces a usable one.
    fn create_database(&mut self) -> Result<()>;

    /// All persisted alerts, in no particular order.
    fn load(&mut self) -> Result<Vec<AlertRecord>>;

    /// Insert a new record. Fails if the token is already stored.
    fn store(&mut self, record: &AlertRecord) -> Result<()>;

    /// Update the time and state of an existing record.
    fn modify(&mut self, record: &AlertRecord) -> Result<()>;

    /// Remove one record.
    fn erase(&mut self, token: &str) -> Result<()>;

    /// Remove several records atomically.
    fn bulk_erase(&mut self, tokens: &[String]) -> Result<()>;

    /// Remove every alert and offline record.
    fn clear_database(&mut self) -> Result<()>;

    /// Remember an alert that was stopped while offline.
    fn store_offline_alert(&mut self, alert: &OfflineStoppedAlert) -> Result<()>;

    /// All offline-stopped alerts.
    fn load_offline_alerts(&mut self) -> Result<Vec<OfflineStoppedAlert>>;

    /// Forget an offline-stopped alert once it has been reported.
    fn erase_offline_alert(&mut self, token: &str) -> Result<()>;
}
