//! Value types shared by the alert entity, storage and observers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AlertsError;

/// Kind of alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Alarm,
    Timer,
    Reminder,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alarm => "alarm",
            Self::Timer => "timer",
            Self::Reminder => "reminder",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = AlertsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alarm" => Ok(Self::Alarm),
            "timer" => Ok(Self::Timer),
            "reminder" => Ok(Self::Reminder),
            other => Err(AlertsError::InvalidAlert(format!("unknown alert type {other:?}"))),
        }
    }
}

/// Lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// Waiting for its due time.
    Set,
    /// Handed to the renderer, not yet confirmed.
    Activating,
    /// Renderer confirmed playback.
    Active,
    /// Renderer asked to stop, not yet confirmed.
    Stopping,
    Stopped,
    /// Requeued with a later time.
    Snoozed,
    Completed,
    /// Missed its window while the process was down.
    PastDue,
    Error,
}

impl AlertState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Snoozed => "snoozed",
            Self::Completed => "completed",
            Self::PastDue => "past_due",
            Self::Error => "error",
        }
    }

    /// States in which the renderer owns the alert.
    pub fn is_rendering(self) -> bool {
        matches!(self, Self::Activating | Self::Active | Self::Stopping)
    }

    /// States after which the alert is purged.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Stopped | Self::Completed | Self::PastDue | Self::Error
        )
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertState {
    type Err = AlertsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(Self::Set),
            "activating" => Ok(Self::Activating),
            "active" => Ok(Self::Active),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            "snoozed" => Ok(Self::Snoozed),
            "completed" => Ok(Self::Completed),
            "past_due" => Ok(Self::PastDue),
            "error" => Ok(Self::Error),
            other => Err(AlertsError::InvalidAlert(format!("unknown alert state {other:?}"))),
        }
    }
}

/// Focus granted to the alerts channel by the host's arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusState {
    Foreground,
    Background,
    #[default]
    None,
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Foreground => "foreground",
            Self::Background => "background",
            Self::None => "none",
        })
    }
}

/// Why an alert was asked to stop rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    /// Deleted by a remote directive.
    AvsStop,
    /// Stopped on the device (focus lost, user button).
    LocalStop,
    Shutdown,
    LogOut,
    /// Rendering interrupted by a snooze.
    Snooze,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AvsStop => "AVS_STOP",
            Self::LocalStop => "LOCAL_STOP",
            Self::Shutdown => "SHUTDOWN",
            Self::LogOut => "LOG_OUT",
            Self::Snooze => "SNOOZE",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time the user originally asked for, independent of snoozes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OriginalTime {
    hour: u8,
    minute: u8,
    second: u8,
    millisecond: u16,
}

impl OriginalTime {
    /// # Errors
    ///
    /// Returns an error if any component is out of range.
    pub fn new(hour: u8, minute: u8, second: u8, millisecond: u16) -> Result<Self, AlertsError> {
        if hour > 23 || minute > 59 || second > 59 || millisecond > 999 {
            return Err(AlertsError::InvalidAlert(format!(
                "original time {hour}:{minute}:{second}.{millisecond} out of range"
            )));
        }
        Ok(Self {
            hour,
            minute,
            second,
            millisecond,
        })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    pub fn millisecond(&self) -> u16 {
        self.millisecond
    }
}

impl fmt::Display for OriginalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            self.hour, self.minute, self.second, self.millisecond
        )
    }
}

impl FromStr for OriginalTime {
    type Err = AlertsError;

    /// Parses `HH:MM:SS` with an optional `.mmm` fraction.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || AlertsError::InvalidAlert(format!("bad original time {s:?}"));
        let (clock, millis) = match s.split_once('.') {
            Some((clock, frac)) => (clock, frac.parse::<u16>().map_err(|_| bad())?),
            None => (s, 0),
        };
        let mut parts = clock.split(':').map(|p| p.parse::<u8>().map_err(|_| bad()));
        let hour = parts.next().ok_or_else(bad)??;
        let minute = parts.next().ok_or_else(bad)??;
        let second = parts.next().ok_or_else(bad)??;
        if parts.next().is_some() {
            return Err(bad());
        }
        Self::new(hour, minute, second, millis)
    }
}

impl TryFrom<String> for OriginalTime {
    type Error = AlertsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OriginalTime> for String {
    fn from(value: OriginalTime) -> Self {
        value.to_string()
    }
}

/// Read-only copy of an alert's identity, handed to renderers and observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDescriptor {
    pub token: String,
    pub alert_type: AlertType,
    /// Seconds since the Unix epoch.
    pub scheduled_time: i64,
    pub original_time: Option<OriginalTime>,
    pub label: Option<String>,
}

/// Persisted form of an alert, also used for read-only snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub token: String,
    pub alert_type: AlertType,
    pub state: AlertState,
    /// Seconds since the Unix epoch.
    pub scheduled_time: i64,
    pub original_time: Option<OriginalTime>,
    pub label: Option<String>,
}

/// An alert that was stopped while the device was offline.
///
/// Kept until the host reports the stop upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineStoppedAlert {
    pub token: String,
    pub scheduled_time: i64,
    /// When the stop happened.
    pub event_time: i64,
}
