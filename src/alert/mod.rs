//! The alert entity and its state machine.
//!
//! ```text
//! SET|SNOOZED --activate--> ACTIVATING --Started--> ACTIVE --Completed--> COMPLETED
//! ACTIVE --snooze--> STOPPING(snooze pending) --Stopped--> SNOOZED
//! ACTIVATING|ACTIVE|STOPPING --deactivate--> STOPPING --Stopped--> STOPPED
//! ACTIVATING|ACTIVE --window closes--> STOPPING(expired) --Stopped--> COMPLETED
//! any live state --Error--> ERROR
//! ```
//!
//! Transitions never call the renderer directly. They return a
//! [`RenderCommand`] that the scheduler dispatches once its lock is released.

mod types;

pub use types::{
    AlertDescriptor, AlertRecord, AlertState, AlertType, FocusState, OfflineStoppedAlert,
    OriginalTime, StopReason,
};

use std::time::Duration;

use crate::clock::is_valid_instant;
use crate::error::{AlertsError, Result};
use crate::renderer::{RenderCommand, RendererState};

/// What a renderer report meant for the alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererOutcome {
    /// Playback confirmed; the alert is now `Active`.
    Started,
    /// Stop confirmed; terminal.
    Stopped(StopReason),
    /// Stop for a snooze confirmed; the alert waits for its new time.
    Snoozed,
    /// Renderer played the alert to the end; terminal.
    Completed,
    /// Rendering failed; terminal.
    Failed(String),
    /// Report does not apply to the current state.
    Ignored,
}

/// One alarm, timer or reminder.
#[derive(Debug)]
pub struct Alert {
    token: String,
    alert_type: AlertType,
    scheduled_time: i64,
    original_time: Option<OriginalTime>,
    label: Option<String>,
    state: AlertState,
    focus: FocusState,
    stop_reason: Option<StopReason>,
    snooze_pending: bool,
    /// Rendering ran past its window; the pending stop counts as completion.
    rendering_expired: bool,
}

impl Alert {
    /// Create an alert in `Set`.
    ///
    /// # Errors
    ///
    /// Returns [`AlertsError::InvalidAlert`] if the token is empty or the
    /// time is not a representable instant.
    pub fn new(token: impl Into<String>, alert_type: AlertType, scheduled_time: i64) -> Result<Self> {
        let token = token.into();
        validate(&token, scheduled_time)?;
        Ok(Self {
            token,
            alert_type,
            scheduled_time,
            original_time: None,
            label: None,
            state: AlertState::Set,
            focus: FocusState::None,
            stop_reason: None,
            snooze_pending: false,
            rendering_expired: false,
        })
    }

    #[must_use]
    pub fn with_original_time(mut self, original_time: OriginalTime) -> Self {
        self.original_time = Some(original_time);
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Rebuild an alert from storage, keeping its persisted state.
    ///
    /// # Errors
    ///
    /// Same validation as [`Alert::new`].
    pub fn from_record(record: AlertRecord) -> Result<Self> {
        validate(&record.token, record.scheduled_time)?;
        Ok(Self {
            token: record.token,
            alert_type: record.alert_type,
            scheduled_time: record.scheduled_time,
            original_time: record.original_time,
            label: record.label,
            state: record.state,
            focus: FocusState::None,
            stop_reason: None,
            snooze_pending: false,
            rendering_expired: false,
        })
    }

    pub fn to_record(&self) -> AlertRecord {
        AlertRecord {
            token: self.token.clone(),
            alert_type: self.alert_type,
            state: self.state,
            scheduled_time: self.scheduled_time,
            original_time: self.original_time,
            label: self.label.clone(),
        }
    }

    pub fn descriptor(&self) -> AlertDescriptor {
        AlertDescriptor {
            token: self.token.clone(),
            alert_type: self.alert_type,
            scheduled_time: self.scheduled_time,
            original_time: self.original_time,
            label: self.label.clone(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn alert_type(&self) -> AlertType {
        self.alert_type
    }

    pub fn scheduled_time(&self) -> i64 {
        self.scheduled_time
    }

    pub fn original_time(&self) -> Option<OriginalTime> {
        self.original_time
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn focus(&self) -> FocusState {
        self.focus
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// `true` once `scheduled_time + limit` lies before `now`.
    pub fn is_past_due(&self, now: i64, limit: Duration) -> bool {
        self.scheduled_time.saturating_add(secs(limit)) < now
    }

    /// Last instant at which the alert may still be rendering.
    pub fn rendering_deadline(&self, max_rendering: Duration) -> i64 {
        self.scheduled_time.saturating_add(secs(max_rendering))
    }

    /// Return to `Set`, dropping any rendering progress.
    pub fn reset(&mut self) {
        self.state = AlertState::Set;
        self.focus = FocusState::None;
        self.stop_reason = None;
        self.snooze_pending = false;
        self.rendering_expired = false;
    }

    /// Hand the alert to the renderer.
    ///
    /// # Errors
    ///
    /// Fails unless the alert is `Set` or `Snoozed`.
    pub fn activate(&mut self, focus: FocusState) -> Result<RenderCommand> {
        if !matches!(self.state, AlertState::Set | AlertState::Snoozed) {
            return Err(self.rejected("activate"));
        }
        self.state = AlertState::Activating;
        self.focus = focus;
        self.stop_reason = None;
        self.snooze_pending = false;
        self.rendering_expired = false;
        Ok(RenderCommand::Activate {
            alert: self.descriptor(),
            focus,
        })
    }

    /// Ask the renderer to stop.
    ///
    /// Overrides a pending snooze: the alert ends as `Stopped`.
    ///
    /// # Errors
    ///
    /// Fails unless the alert is rendering.
    pub fn deactivate(&mut self, reason: StopReason) -> Result<RenderCommand> {
        if !self.state.is_rendering() {
            return Err(self.rejected("deactivate"));
        }
        self.state = AlertState::Stopping;
        self.stop_reason = Some(reason);
        self.snooze_pending = false;
        Ok(RenderCommand::Deactivate {
            alert: self.descriptor(),
            reason,
        })
    }

    /// Move the alert to `new_time` and stop the current rendering.
    ///
    /// The alert stays rendering until the renderer confirms the stop, which
    /// yields [`RendererOutcome::Snoozed`].
    ///
    /// # Errors
    ///
    /// Fails unless the alert is `Active` and `new_time` is a valid instant.
    pub fn snooze(&mut self, new_time: i64) -> Result<RenderCommand> {
        if self.state != AlertState::Active {
            return Err(self.rejected("snooze"));
        }
        validate(&self.token, new_time)?;
        self.scheduled_time = new_time;
        self.state = AlertState::Stopping;
        self.stop_reason = None;
        self.snooze_pending = true;
        Ok(RenderCommand::Deactivate {
            alert: self.descriptor(),
            reason: StopReason::Snooze,
        })
    }

    /// Propagate a focus change to an alert that is being rendered.
    ///
    /// Returns `None` when the alert is not activating or active.
    pub fn set_focus_state(&mut self, focus: FocusState) -> Option<RenderCommand> {
        if !matches!(self.state, AlertState::Activating | AlertState::Active) {
            return None;
        }
        self.focus = focus;
        Some(RenderCommand::SetFocus {
            alert: self.descriptor(),
            focus,
        })
    }

    /// Move a waiting alert to a new due time. The alert returns to `Set`.
    ///
    /// # Errors
    ///
    /// Fails while the alert is rendering or if `new_time` is invalid.
    pub fn update_scheduled_time(&mut self, new_time: i64) -> Result<()> {
        if self.state.is_rendering() {
            return Err(self.rejected("reschedule"));
        }
        validate(&self.token, new_time)?;
        self.scheduled_time = new_time;
        self.state = AlertState::Set;
        Ok(())
    }

    /// Stop an alert whose rendering window has closed.
    ///
    /// The renderer's confirming stop then reports
    /// [`RendererOutcome::Completed`]. Returns `None` unless the alert is
    /// activating or active.
    pub fn expire_rendering(&mut self) -> Option<RenderCommand> {
        if !matches!(self.state, AlertState::Activating | AlertState::Active) {
            return None;
        }
        self.state = AlertState::Stopping;
        self.stop_reason = Some(StopReason::LocalStop);
        self.snooze_pending = false;
        self.rendering_expired = true;
        Some(RenderCommand::Deactivate {
            alert: self.descriptor(),
            reason: StopReason::LocalStop,
        })
    }

    /// Undo an [`Alert::update_scheduled_time`] whose persistence failed.
    pub(crate) fn restore_schedule(&mut self, scheduled_time: i64, state: AlertState) {
        self.scheduled_time = scheduled_time;
        self.state = state;
    }

    pub(crate) fn mark_past_due(&mut self) {
        self.state = AlertState::PastDue;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.state = AlertState::Error;
        self.focus = FocusState::None;
    }

    /// Apply a renderer report.
    pub fn on_renderer_state_change(
        &mut self,
        reported: RendererState,
        reason: &str,
    ) -> RendererOutcome {
        match (reported, self.state) {
            (RendererState::Started, AlertState::Activating) => {
                self.state = AlertState::Active;
                RendererOutcome::Started
            }
            (RendererState::Stopped, AlertState::Stopping) if self.rendering_expired => {
                self.state = AlertState::Completed;
                self.focus = FocusState::None;
                RendererOutcome::Completed
            }
            (RendererState::Stopped, AlertState::Stopping) if self.snooze_pending => {
                self.state = AlertState::Snoozed;
                self.focus = FocusState::None;
                self.snooze_pending = false;
                RendererOutcome::Snoozed
            }
            (RendererState::Stopped, AlertState::Stopping) => {
                self.state = AlertState::Stopped;
                self.focus = FocusState::None;
                RendererOutcome::Stopped(self.stop_reason.unwrap_or(StopReason::LocalStop))
            }
            (RendererState::Stopped, AlertState::Activating | AlertState::Active) => {
                self.mark_failed();
                RendererOutcome::Failed("renderer stopped unexpectedly".to_owned())
            }
            (RendererState::Completed, state) if state.is_rendering() => {
                self.state = AlertState::Completed;
                self.focus = FocusState::None;
                RendererOutcome::Completed
            }
            (RendererState::Error, AlertState::Stopping) => RendererOutcome::Ignored,
            (RendererState::Error, state) if !state.is_terminal() => {
                self.mark_failed();
                RendererOutcome::Failed(reason.to_owned())
            }
            _ => RendererOutcome::Ignored,
        }
    }

    fn rejected(&self, operation: &'static str) -> AlertsError {
        AlertsError::InvalidTransition {
            token: self.token.clone(),
            state: self.state.to_string(),
            operation,
        }
    }
}

fn validate(token: &str, scheduled_time: i64) -> Result<()> {
    if token.is_empty() {
        return Err(AlertsError::InvalidAlert("empty token".to_owned()));
    }
    if !is_valid_instant(scheduled_time) {
        return Err(AlertsError::InvalidAlert(format!(
            "alert {token} has invalid time {scheduled_time}"
        )));
    }
    Ok(())
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}
