//! Shared helpers for integration tests.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crossbeam_channel::Receiver;
use fae_alerts::alert::{AlertDescriptor, AlertRecord, AlertState, AlertType, FocusState, StopReason};
use fae_alerts::clock::{Clock, SystemClock};
use fae_alerts::config::SchedulerConfig;
use fae_alerts::{AlertEvent, AlertInfo, AlertScheduler, Renderer, RendererState, SqliteAlertStorage};

pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// Renderer that immediately confirms every command back to the scheduler.
#[derive(Default)]
pub(crate) struct EchoRenderer {
    scheduler: OnceLock<AlertScheduler>,
}

impl EchoRenderer {
    fn report(&self, token: &str, state: RendererState) {
        if let Some(scheduler) = self.scheduler.get() {
            scheduler.on_alert_state_change(token, state, "");
        }
    }
}

impl Renderer for EchoRenderer {
    fn activate(&self, alert: &AlertDescriptor, _focus: FocusState) {
        self.report(&alert.token, RendererState::Started);
    }

    fn deactivate(&self, alert: &AlertDescriptor, _reason: StopReason) {
        self.report(&alert.token, RendererState::Stopped);
    }

    fn set_focus(&self, _alert: &AlertDescriptor, _focus: FocusState) {}
}

pub(crate) fn now() -> i64 {
    SystemClock.now().expect("system clock")
}

pub(crate) fn stored_alarm(token: &str, scheduled_time: i64, state: AlertState) -> AlertRecord {
    AlertRecord {
        token: token.to_owned(),
        alert_type: AlertType::Alarm,
        state,
        scheduled_time,
        original_time: None,
        label: Some("integration".to_owned()),
    }
}

/// Start a scheduler over the SQLite file at `db`.
/// Returns `(scheduler, event_rx)`.
pub(crate) fn start_scheduler(db: &Path) -> (AlertScheduler, Receiver<AlertInfo>) {
    let renderer = Arc::new(EchoRenderer::default());
    let scheduler = AlertScheduler::new(
        Box::new(SqliteAlertStorage::new(db)),
        renderer.clone(),
        &SchedulerConfig::default(),
    )
    .expect("build scheduler");
    let _ = renderer.scheduler.set(scheduler.clone());

    let (tx, rx) = crossbeam_channel::unbounded();
    scheduler.initialize(Arc::new(tx)).expect("initialize scheduler");
    (scheduler, rx)
}

/// Wait for `event` on `token`, skipping anything else.
pub(crate) fn wait_for(events: &Receiver<AlertInfo>, token: &str, event: AlertEvent) -> AlertInfo {
    loop {
        let info = events
            .recv_timeout(WAIT)
            .unwrap_or_else(|_| panic!("timed out waiting for {event} on {token}"));
        if info.token() == token && info.event == event {
            return info;
        }
    }
}
