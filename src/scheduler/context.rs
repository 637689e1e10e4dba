//! Read-only views of the scheduler's alerts.

use serde::{Deserialize, Serialize};

use crate::alert::{Alert, AlertType};
use crate::clock::format_iso8601;

/// One alert as reported to the host's context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertContext {
    pub token: String,
    pub alert_type: AlertType,
    pub scheduled_time: i64,
    pub scheduled_time_iso_8601: String,
}

impl From<&Alert> for AlertContext {
    fn from(alert: &Alert) -> Self {
        let scheduled_time = alert.scheduled_time();
        Self {
            token: alert.token().to_owned(),
            alert_type: alert.alert_type(),
            scheduled_time,
            scheduled_time_iso_8601: format_iso8601(scheduled_time)
                .unwrap_or_else(|_| scheduled_time.to_string()),
        }
    }
}

/// Snapshot of every alert the scheduler knows about.
///
/// The active alert appears in both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertsContextInfo {
    pub scheduled_alerts: Vec<AlertContext>,
    pub active_alerts: Vec<AlertContext>,
}

impl AlertsContextInfo {
    /// Whether `token` is listed among the scheduled alerts.
    pub fn contains(&self, token: &str) -> bool {
        self.scheduled_alerts.iter().any(|a| a.token == token)
    }
}
