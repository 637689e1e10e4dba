//! SQLite-backed alert storage.
//!
//! One database file holds the `alerts` and `offline_alerts` tables.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OpenFlags, params};
use tracing::{debug, info, warn};

use super::schema::{CURRENT_SCHEMA_VERSION, apply_schema, has_required_tables, read_schema_version};
use super::{AlertStorage, RetryPolicy};
use crate::alert::{AlertRecord, AlertState, AlertType, OfflineStoppedAlert, OriginalTime};
use crate::clock::format_iso8601;
use crate::error::{AlertsError, Result};

/// [`AlertStorage`] persisted in a single SQLite file.
///
/// The connection is established by [`AlertStorage::open`] or
/// [`AlertStorage::create_database`]; every other call fails until then.
pub struct SqliteAlertStorage {
    path: PathBuf,
    conn: Option<Connection>,
    retry: RetryPolicy,
}

impl SqliteAlertStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Override how a busy database is retried while opening.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| AlertsError::Storage("alerts database is not open".to_owned()))
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| AlertsError::Storage("alerts database is not open".to_owned()))
    }
}

impl AlertStorage for SqliteAlertStorage {
    fn open(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Err(AlertsError::StorageUnusable(format!(
                "no alerts database at {}",
                self.path.display()
            )));
        }
        let (conn, complete) = self.retry.run(|| open_existing(&self.path), is_busy).map_err(
            |e| {
                if is_unusable(&e) {
                    AlertsError::StorageUnusable(format!("{}: {e}", self.path.display()))
                } else {
                    AlertsError::Sqlite(e)
                }
            },
        )?;
        if !complete {
            return Err(AlertsError::StorageUnusable(format!(
                "alerts database at {} is missing tables",
                self.path.display()
            )));
        }
        match read_schema_version(&conn)? {
            Some(v) if v == CURRENT_SCHEMA_VERSION => {}
            other => warn!(
                "alerts database schema version {other:?}, expected {CURRENT_SCHEMA_VERSION}"
            ),
        }
        debug!("opened alerts database at {}", self.path.display());
        self.conn = Some(conn);
        Ok(())
    }

    fn create_database(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.conn = None;
        if self.path.exists() {
            match open_existing(&self.path) {
                Ok((_, true)) => {
                    return Err(AlertsError::Storage(format!(
                        "alerts database already exists at {}",
                        self.path.display()
                    )));
                }
                Ok((_, false)) => {}
                Err(e) if is_unusable(&e) => {}
                Err(e) => return Err(AlertsError::Sqlite(e)),
            }
            warn!("replacing unusable alerts database at {}", self.path.display());
            std::fs::remove_file(&self.path)?;
            for suffix in ["-wal", "-shm"] {
                let mut sidecar = self.path.clone().into_os_string();
                sidecar.push(suffix);
                let _ = std::fs::remove_file(sidecar);
            }
        }
        let conn = Connection::open(&self.path)?;
        apply_schema(&conn)?;
        info!("created alerts database at {}", self.path.display());
        self.conn = Some(conn);
        Ok(())
    }

    fn load(&mut self) -> Result<Vec<AlertRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT token, alert_type, state, scheduled_time_unix, original_time, label \
             FROM alerts ORDER BY scheduled_time_unix, token",
        )?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            match row {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping unreadable alert row: {e}"),
            }
        }
        Ok(records)
    }

    fn store(&mut self, record: &AlertRecord) -> Result<()> {
        let iso = format_iso8601(record.scheduled_time)?;
        let original = record.original_time.map(|t| t.to_string());
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO alerts (token, alert_type, state, scheduled_time_unix, \
             scheduled_time_iso_8601, original_time, label, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.token,
                record.alert_type.as_str(),
                record.state.as_str(),
                record.scheduled_time,
                iso,
                original,
                record.label,
                now,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(AlertsError::Storage(format!(
                    "alert {} already stored",
                    record.token
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn modify(&mut self, record: &AlertRecord) -> Result<()> {
        let iso = format_iso8601(record.scheduled_time)?;
        let changed = self.conn()?.execute(
            "UPDATE alerts SET state = ?1, scheduled_time_unix = ?2, \
             scheduled_time_iso_8601 = ?3 WHERE token = ?4",
            params![record.state.as_str(), record.scheduled_time, iso, record.token],
        )?;
        if changed == 0 {
            return Err(not_stored(&record.token));
        }
        Ok(())
    }

    fn erase(&mut self, token: &str) -> Result<()> {
        let changed = self
            .conn()?
            .execute("DELETE FROM alerts WHERE token = ?1", params![token])?;
        if changed == 0 {
            return Err(not_stored(token));
        }
        Ok(())
    }

    fn bulk_erase(&mut self, tokens: &[String]) -> Result<()> {
        let tx = self.conn_mut()?.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM alerts WHERE token = ?1")?;
            for token in tokens {
                stmt.execute(params![token])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_database(&mut self) -> Result<()> {
        self.conn()?
            .execute_batch("DELETE FROM alerts; DELETE FROM offline_alerts;")?;
        info!("cleared alerts database");
        Ok(())
    }

    fn store_offline_alert(&mut self, alert: &OfflineStoppedAlert) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO offline_alerts (token, scheduled_time_unix, event_time_unix) \
             VALUES (?1, ?2, ?3)",
            params![alert.token, alert.scheduled_time, alert.event_time],
        )?;
        Ok(())
    }

    fn load_offline_alerts(&mut self) -> Result<Vec<OfflineStoppedAlert>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT token, scheduled_time_unix, event_time_unix FROM offline_alerts ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OfflineStoppedAlert {
                token: row.get(0)?,
                scheduled_time: row.get(1)?,
                event_time: row.get(2)?,
            })
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    fn erase_offline_alert(&mut self, token: &str) -> Result<()> {
        let changed = self
            .conn()?
            .execute("DELETE FROM offline_alerts WHERE token = ?1", params![token])?;
        if changed == 0 {
            return Err(AlertsError::Storage(format!(
                "offline alert {token} not stored"
            )));
        }
        Ok(())
    }
}

/// Open an existing file and report whether it carries the alert tables.
fn open_existing(path: &Path) -> rusqlite::Result<(Connection, bool)> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let complete = has_required_tables(&conn)?;
    Ok((conn, complete))
}

/// File is not a database, or is damaged beyond use.
fn is_unusable(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn not_stored(token: &str) -> AlertsError {
    AlertsError::Storage(format!("alert {token} not stored"))
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRecord> {
    let alert_type: String = row.get(1)?;
    let state: String = row.get(2)?;
    let original: Option<String> = row.get(4)?;
    Ok(AlertRecord {
        token: row.get(0)?,
        alert_type: alert_type.parse::<AlertType>().map_err(|e| conversion_error(1, e))?,
        state: state.parse::<AlertState>().map_err(|e| conversion_error(2, e))?,
        scheduled_time: row.get(3)?,
        original_time: original
            .map(|t| t.parse::<OriginalTime>())
            .transpose()
            .map_err(|e| conversion_error(4, e))?,
        label: row.get(5)?,
    })
}

fn conversion_error(column: usize, e: AlertsError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn record(token: &str, time: i64) -> AlertRecord {
        AlertRecord {
            token: token.to_owned(),
            alert_type: AlertType::Alarm,
            state: AlertState::Set,
            scheduled_time: time,
            original_time: Some(OriginalTime::new(6, 45, 0, 0).unwrap()),
            label: Some("gym".to_owned()),
        }
    }

    fn created(dir: &tempfile::TempDir) -> SqliteAlertStorage {
        let mut storage = SqliteAlertStorage::new(dir.path().join("alerts.db"));
        storage.create_database().unwrap();
        storage
    }

    #[test]
    fn open_fails_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SqliteAlertStorage::new(dir.path().join("missing.db"));
        assert!(storage.open().is_err());
        assert!(!dir.path().join("missing.db").exists());
    }

    #[test]
    fn open_fails_without_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (x INTEGER);")
            .unwrap();
        let mut storage = SqliteAlertStorage::new(&path).with_retry_policy(RetryPolicy::none());
        assert!(matches!(storage.open(), Err(AlertsError::StorageUnusable(_))));
    }

    #[test]
    fn calls_before_open_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SqliteAlertStorage::new(dir.path().join("alerts.db"));
        assert!(storage.load().is_err());
        assert!(storage.store(&record("a", 100)).is_err());
    }

    #[test]
    fn create_makes_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SqliteAlertStorage::new(dir.path().join("a").join("b").join("alerts.db"));
        storage.create_database().unwrap();
        assert!(storage.path().exists());
    }

    #[test]
    fn create_replaces_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.db");
        std::fs::write(&path, b"definitely not sqlite").unwrap();

        let mut storage = SqliteAlertStorage::new(&path).with_retry_policy(RetryPolicy::none());
        assert!(storage.open().is_err());
        storage.create_database().unwrap();
        storage.store(&record("a", 100)).unwrap();
        assert_eq!(storage.load().unwrap().len(), 1);
    }

    #[test]
    fn create_refuses_to_replace_healthy_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = created(&dir);
        storage.store(&record("keep", 100)).unwrap();
        drop(storage);

        let mut again = SqliteAlertStorage::new(dir.path().join("alerts.db"));
        assert!(matches!(again.create_database(), Err(AlertsError::Storage(_))));
        again.open().unwrap();
        assert_eq!(again.load().unwrap().len(), 1);
    }

    #[test]
    fn locked_database_is_never_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.db");
        let mut storage = created(&dir);
        storage.store(&record("keep-me", 100)).unwrap();
        drop(storage);

        let holder = Connection::open(&path).unwrap();
        holder
            .execute_batch(
                "PRAGMA locking_mode = EXCLUSIVE; BEGIN EXCLUSIVE; \
                 UPDATE alerts SET label = label;",
            )
            .unwrap();

        let mut blocked = SqliteAlertStorage::new(&path).with_retry_policy(RetryPolicy::none());
        let opened = blocked.open();
        assert!(matches!(opened, Err(AlertsError::Sqlite(_))), "{opened:?}");
        assert!(blocked.create_database().is_err());

        holder.execute_batch("COMMIT;").unwrap();
        drop(holder);

        let mut reopened = SqliteAlertStorage::new(&path);
        reopened.open().unwrap();
        let tokens: Vec<String> = reopened.load().unwrap().into_iter().map(|r| r.token).collect();
        assert_eq!(tokens, vec!["keep-me".to_owned()]);
    }

    #[test]
    fn store_and_load_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = created(&dir);
        storage.store(&record("late", 2_000)).unwrap();
        storage.store(&record("early", 1_000)).unwrap();
        drop(storage);

        let mut reopened = SqliteAlertStorage::new(dir.path().join("alerts.db"));
        reopened.open().unwrap();
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded, vec![record("early", 1_000), record("late", 2_000)]);
    }

    #[test]
    fn duplicate_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = created(&dir);
        storage.store(&record("a", 100)).unwrap();
        assert!(matches!(
            storage.store(&record("a", 200)),
            Err(AlertsError::Storage(_))
        ));
    }

    #[test]
    fn modify_updates_time_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = created(&dir);
        storage.store(&record("a", 100)).unwrap();

        let mut changed = record("a", 900);
        changed.state = AlertState::Snoozed;
        storage.modify(&changed).unwrap();

        assert_eq!(storage.load().unwrap(), vec![changed]);
        assert!(storage.modify(&record("ghost", 1)).is_err());
    }

    #[test]
    fn erase_and_bulk_erase() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = created(&dir);
        for (token, time) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            storage.store(&record(token, time)).unwrap();
        }
        storage.erase("a").unwrap();
        assert!(storage.erase("a").is_err());

        storage
            .bulk_erase(&["b".to_owned(), "d".to_owned(), "zzz".to_owned()])
            .unwrap();
        let tokens: Vec<String> = storage.load().unwrap().into_iter().map(|r| r.token).collect();
        assert_eq!(tokens, vec!["c".to_owned()]);
    }

    #[test]
    fn unreadable_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = created(&dir);
        storage.store(&record("good", 1)).unwrap();
        storage
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO alerts (token, alert_type, state, scheduled_time_unix, \
                 scheduled_time_iso_8601) VALUES ('bad', 'doorbell', 'set', 2, 'x')",
                [],
            )
            .unwrap();
        let loaded = storage.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].token, "good");
    }

    #[test]
    fn offline_alerts_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = created(&dir);
        let offline = OfflineStoppedAlert {
            token: "a".to_owned(),
            scheduled_time: 100,
            event_time: 160,
        };
        storage.store_offline_alert(&offline).unwrap();
        storage.store_offline_alert(&offline).unwrap();
        assert_eq!(storage.load_offline_alerts().unwrap(), vec![offline]);

        storage.erase_offline_alert("a").unwrap();
        assert!(storage.erase_offline_alert("a").is_err());

        storage.store(&record("x", 5)).unwrap();
        storage
            .store_offline_alert(&OfflineStoppedAlert {
                token: "y".to_owned(),
                scheduled_time: 1,
                event_time: 2,
            })
            .unwrap();
        storage.clear_database().unwrap();
        assert!(storage.load().unwrap().is_empty());
        assert!(storage.load_offline_alerts().unwrap().is_empty());
    }

    #[test]
    fn busy_errors_are_transient() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(is_busy(&busy));
        assert!(!is_busy(&rusqlite::Error::QueryReturnedNoRows));
    }
}
