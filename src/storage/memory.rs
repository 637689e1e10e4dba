//! In-memory alert storage.
//!
//! Clones share the same backing state, so a host (or a test) can keep a
//! handle to inspect what the scheduler persisted. Individual operations can
//! be made to fail on demand.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::AlertStorage;
use crate::alert::{AlertRecord, OfflineStoppedAlert};
use crate::error::{AlertsError, Result};

/// Storage operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageOp {
    Open,
    CreateDatabase,
    Load,
    Store,
    Modify,
    Erase,
    BulkErase,
    ClearDatabase,
}

#[derive(Debug, Default)]
struct MemoryState {
    exists: bool,
    opened: bool,
    alerts: BTreeMap<String, AlertRecord>,
    offline: BTreeMap<String, OfflineStoppedAlert>,
    failing: Vec<StorageOp>,
}

/// Shared in-memory [`AlertStorage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryAlertStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAlertStorage {
    /// Storage with no database yet; `open` fails until one is created.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose database already exists and holds `records`.
    pub fn with_records(records: impl IntoIterator<Item = AlertRecord>) -> Self {
        let storage = Self::default();
        if let Ok(mut state) = storage.state.lock() {
            state.exists = true;
            state.alerts = records.into_iter().map(|r| (r.token.clone(), r)).collect();
        }
        storage
    }

    /// Make `op` fail until [`MemoryAlertStorage::succeed`] is called.
    pub fn fail(&self, op: StorageOp) {
        if let Ok(mut state) = self.state.lock() {
            if !state.failing.contains(&op) {
                state.failing.push(op);
            }
        }
    }

    /// Clear a failure set by [`MemoryAlertStorage::fail`].
    pub fn succeed(&self, op: StorageOp) {
        if let Ok(mut state) = self.state.lock() {
            state.failing.retain(|o| *o != op);
        }
    }

    /// Copy of every stored alert, ordered by token.
    pub fn records(&self) -> Vec<AlertRecord> {
        self.state
            .lock()
            .map(|state| state.alerts.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored copy of one alert.
    pub fn record(&self, token: &str) -> Option<AlertRecord> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.alerts.get(token).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| AlertsError::Storage(format!("lock poisoned: {e}")))
    }

    fn begin(&self, op: StorageOp) -> Result<MutexGuard<'_, MemoryState>> {
        let state = self.lock()?;
        if state.failing.contains(&op) {
            return Err(AlertsError::Storage(format!("{op:?} failed")));
        }
        if !matches!(op, StorageOp::Open | StorageOp::CreateDatabase) && !state.opened {
            return Err(AlertsError::Storage("alerts database is not open".to_owned()));
        }
        Ok(state)
    }
}

impl AlertStorage for MemoryAlertStorage {
    fn open(&mut self) -> Result<()> {
        let mut state = self.begin(StorageOp::Open)?;
        if !state.exists {
            return Err(AlertsError::StorageUnusable("no alerts database".to_owned()));
        }
        state.opened = true;
        Ok(())
    }

    fn create_database(&mut self) -> Result<()> {
        let mut state = self.begin(StorageOp::CreateDatabase)?;
        state.exists = true;
        state.opened = true;
        state.alerts.clear();
        state.offline.clear();
        Ok(())
    }

    fn load(&mut self) -> Result<Vec<AlertRecord>> {
        let state = self.begin(StorageOp::Load)?;
        Ok(state.alerts.values().cloned().collect())
    }

    fn store(&mut self, record: &AlertRecord) -> Result<()> {
        let mut state = self.begin(StorageOp::Store)?;
        if state.alerts.contains_key(&record.token) {
            return Err(AlertsError::Storage(format!(
                "alert {} already stored",
                record.token
            )));
        }
        state.alerts.insert(record.token.clone(), record.clone());
        Ok(())
    }

    fn modify(&mut self, record: &AlertRecord) -> Result<()> {
        let mut state = self.begin(StorageOp::Modify)?;
        match state.alerts.get_mut(&record.token) {
            Some(stored) => {
                stored.state = record.state;
                stored.scheduled_time = record.scheduled_time;
                Ok(())
            }
            None => Err(AlertsError::Storage(format!(
                "alert {} not stored",
                record.token
            ))),
        }
    }

    fn erase(&mut self, token: &str) -> Result<()> {
        let mut state = self.begin(StorageOp::Erase)?;
        state
            .alerts
            .remove(token)
            .map(|_| ())
            .ok_or_else(|| AlertsError::Storage(format!("alert {token} not stored")))
    }

    fn bulk_erase(&mut self, tokens: &[String]) -> Result<()> {
        let mut state = self.begin(StorageOp::BulkErase)?;
        for token in tokens {
            state.alerts.remove(token);
        }
        Ok(())
    }

    fn clear_database(&mut self) -> Result<()> {
        let mut state = self.begin(StorageOp::ClearDatabase)?;
        state.alerts.clear();
        state.offline.clear();
        Ok(())
    }

    fn store_offline_alert(&mut self, alert: &OfflineStoppedAlert) -> Result<()> {
        let mut state = self.begin(StorageOp::Store)?;
        state.offline.insert(alert.token.clone(), alert.clone());
        Ok(())
    }

    fn load_offline_alerts(&mut self) -> Result<Vec<OfflineStoppedAlert>> {
        let state = self.begin(StorageOp::Load)?;
        Ok(state.offline.values().cloned().collect())
    }

    fn erase_offline_alert(&mut self, token: &str) -> Result<()> {
        let mut state = self.begin(StorageOp::Erase)?;
        state
            .offline
            .remove(token)
            .map(|_| ())
            .ok_or_else(|| AlertsError::Storage(format!("offline alert {token} not stored")))
    }
}
