//! SQLite DDL for the alerts database.

use rusqlite::Connection;

/// Bumped whenever the table layout changes.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Complete DDL for the alerts database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alerts (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    token                   TEXT NOT NULL UNIQUE,
    alert_type              TEXT NOT NULL,      -- snake_case AlertType
    state                   TEXT NOT NULL,      -- snake_case AlertState
    scheduled_time_unix     INTEGER NOT NULL,
    scheduled_time_iso_8601 TEXT NOT NULL,
    original_time           TEXT,               -- HH:MM:SS.mmm
    label                   TEXT,
    created_at              INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_alerts_scheduled ON alerts(scheduled_time_unix);

-- Alerts stopped while offline, kept until reported.
CREATE TABLE IF NOT EXISTS offline_alerts (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    token                   TEXT NOT NULL UNIQUE,
    scheduled_time_unix     INTEGER NOT NULL,
    event_time_unix         INTEGER NOT NULL
);
"#;

/// Apply the full schema and seed the version stamp.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// `true` if every table the store needs is present.
pub(crate) fn has_required_tables(conn: &Connection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
         AND name IN ('schema_meta', 'alerts', 'offline_alerts')",
        [],
        |row| row.get(0),
    )?;
    Ok(count == 3)
}

/// Read the current schema version from the database.
///
/// Returns `None` if the key is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
