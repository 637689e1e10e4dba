//! Wall-clock abstraction and ISO-8601 helpers.
//!
//! Alert times are whole seconds since the Unix epoch. The scheduler reads
//! the current time through [`Clock`] so tests can pin it.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{AlertsError, Result};

/// Source of the current absolute time.
pub trait Clock: Send + Sync {
    /// Current time in seconds since the Unix epoch.
    fn now(&self) -> Result<i64>;
}

/// [`Clock`] backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<i64> {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| AlertsError::Clock(e.to_string()))?;
        i64::try_from(elapsed.as_secs()).map_err(|e| AlertsError::Clock(e.to_string()))
    }
}

/// Returns `true` if `secs` maps to a representable UTC instant.
pub fn is_valid_instant(secs: i64) -> bool {
    secs >= 0 && DateTime::<Utc>::from_timestamp(secs, 0).is_some()
}

/// Format epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// # Errors
///
/// Returns an error if `secs` is outside chrono's representable range.
pub fn format_iso8601(secs: i64) -> Result<String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| AlertsError::InvalidAlert(format!("time {secs} out of range")))
}

/// Parse an RFC 3339 / ISO-8601 timestamp into epoch seconds.
///
/// # Errors
///
/// Returns an error if the string is not a valid timestamp.
pub fn parse_iso8601(text: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.timestamp())
        .map_err(|e| AlertsError::InvalidAlert(format!("bad timestamp {text:?}: {e}")))
}
