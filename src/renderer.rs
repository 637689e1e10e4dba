//! Rendering seam.
//!
//! The scheduler never hands its alerts to a renderer. It issues
//! [`RenderCommand`]s carrying an [`AlertDescriptor`] copy, and the renderer
//! reports progress back through
//! [`AlertScheduler::on_alert_state_change`](crate::scheduler::AlertScheduler::on_alert_state_change).

use crate::alert::{AlertDescriptor, FocusState, StopReason};

/// Playback engine for alerts.
///
/// Calls arrive on the scheduler's dispatch thread and must not block for
/// long. Completion is reported asynchronously.
pub trait Renderer: Send + Sync {
    /// Start rendering `alert` with the given focus.
    fn activate(&self, alert: &AlertDescriptor, focus: FocusState);

    /// Stop rendering `alert`. The renderer answers with `Stopped`.
    fn deactivate(&self, alert: &AlertDescriptor, reason: StopReason);

    /// Adjust an ongoing rendering to a new focus (for example duck the volume).
    fn set_focus(&self, alert: &AlertDescriptor, focus: FocusState);
}

/// Progress reported by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Started,
    Stopped,
    Completed,
    Error,
}

/// Request for the renderer produced by an alert transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCommand {
    Activate {
        alert: AlertDescriptor,
        focus: FocusState,
    },
    Deactivate {
        alert: AlertDescriptor,
        reason: StopReason,
    },
    SetFocus {
        alert: AlertDescriptor,
        focus: FocusState,
    },
}

impl RenderCommand {
    /// Token of the alert the command targets.
    pub fn token(&self) -> &str {
        match self {
            Self::Activate { alert, .. }
            | Self::Deactivate { alert, .. }
            | Self::SetFocus { alert, .. } => &alert.token,
        }
    }

    /// Deliver the command.
    pub fn dispatch(&self, renderer: &dyn Renderer) {
        match self {
            Self::Activate { alert, focus } => renderer.activate(alert, *focus),
            Self::Deactivate { alert, reason } => renderer.deactivate(alert, *reason),
            Self::SetFocus { alert, focus } => renderer.set_focus(alert, *focus),
        }
    }
}
