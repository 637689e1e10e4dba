//! Outbound notifications.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::alert::AlertDescriptor;

/// User-visible alert event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertEvent {
    /// Due time reached; the host should request focus.
    Ready,
    Started,
    Stopped,
    Snoozed,
    Completed,
    /// Missed while the device was off; never rendered.
    PastDue,
    FocusEnteredForeground,
    FocusEnteredBackground,
    Error,
    /// Removed by an explicit delete.
    Deleted,
    /// Survived a reload and is waiting for its time.
    ScheduledForLater,
}

impl AlertEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Started => "STARTED",
            Self::Stopped => "STOPPED",
            Self::Snoozed => "SNOOZED",
            Self::Completed => "COMPLETED",
            Self::PastDue => "PAST_DUE",
            Self::FocusEnteredForeground => "FOCUS_ENTERED_FOREGROUND",
            Self::FocusEnteredBackground => "FOCUS_ENTERED_BACKGROUND",
            Self::Error => "ERROR",
            Self::Deleted => "DELETED",
            Self::ScheduledForLater => "SCHEDULED_FOR_LATER",
        }
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered with every [`AlertEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertInfo {
    pub alert: AlertDescriptor,
    pub event: AlertEvent,
    /// Free-form detail: stop reason, error text. Empty when not applicable.
    pub reason: String,
}

impl AlertInfo {
    pub fn new(alert: AlertDescriptor, event: AlertEvent, reason: impl Into<String>) -> Self {
        Self {
            alert,
            event,
            reason: reason.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.alert.token
    }
}

/// Receiver of alert events.
///
/// Called on the scheduler's dispatch thread, in order, never while the
/// scheduler lock is held. Implementations may call back into the scheduler.
pub trait AlertObserver: Send + Sync {
    fn on_alert_state_change(&self, info: &AlertInfo);
}

/// Forward events into a channel.
impl AlertObserver for crossbeam_channel::Sender<AlertInfo> {
    fn on_alert_state_change(&self, info: &AlertInfo) {
        if self.send(info.clone()).is_err() {
            tracing::debug!(token = %info.token(), "alert observer channel closed");
        }
    }
}
