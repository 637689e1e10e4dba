//! Shared test doubles for scheduler unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::alert::{AlertDescriptor, AlertRecord, AlertState, AlertType, FocusState, StopReason};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::error::{AlertsError, Result};
use crate::observer::{AlertEvent, AlertInfo};
use crate::renderer::{RenderCommand, Renderer};
use crate::scheduler::AlertScheduler;
use crate::storage::MemoryAlertStorage;
use crate::timer::{RearmingTimer, TimerCallback};

pub(crate) const WAIT: Duration = Duration::from_secs(2);

/// Clock pinned to a settable instant. `None` means the clock fails.
#[derive(Clone)]
pub(crate) struct ManualClock {
    now: Arc<Mutex<Option<i64>>>,
}

impl ManualClock {
    pub(crate) fn at(now: i64) -> Self {
        Self {
            now: Arc::new(Mutex::new(Some(now))),
        }
    }

    pub(crate) fn set(&self, now: i64) {
        *self.now.lock().unwrap() = Some(now);
    }

    pub(crate) fn fail(&self) {
        *self.now.lock().unwrap() = None;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<i64> {
        self.now
            .lock()
            .unwrap()
            .ok_or_else(|| AlertsError::Clock("clock unavailable".into()))
    }
}

#[derive(Default)]
struct ManualTimerState {
    armed: Option<(Duration, TimerCallback)>,
    arm_count: usize,
}

/// Timer that only fires when the test says so.
#[derive(Clone, Default)]
pub(crate) struct ManualTimer {
    state: Arc<Mutex<ManualTimerState>>,
}

impl ManualTimer {
    pub(crate) fn armed_delay(&self) -> Option<Duration> {
        self.state.lock().unwrap().armed.as_ref().map(|(d, _)| *d)
    }

    pub(crate) fn arm_count(&self) -> usize {
        self.state.lock().unwrap().arm_count
    }

    /// Run the pending callback, if any.
    pub(crate) fn fire(&self) -> bool {
        let armed = self.state.lock().unwrap().armed.take();
        match armed {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl RearmingTimer for ManualTimer {
    fn arm(&mut self, delay: Duration, callback: TimerCallback) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.armed = Some((delay, callback));
        state.arm_count += 1;
        Ok(())
    }

    fn cancel(&mut self) {
        self.state.lock().unwrap().armed = None;
    }

    fn is_active(&self) -> bool {
        self.state.lock().unwrap().armed.is_some()
    }
}

/// Renderer that forwards every command into a channel.
pub(crate) struct RecordingRenderer {
    commands: Sender<RenderCommand>,
}

impl RecordingRenderer {
    pub(crate) fn new() -> (Arc<Self>, Receiver<RenderCommand>) {
        let (commands, rx) = crossbeam_channel::unbounded();
        (Arc::new(Self { commands }), rx)
    }
}

impl Renderer for RecordingRenderer {
    fn activate(&self, alert: &AlertDescriptor, focus: FocusState) {
        let _ = self.commands.send(RenderCommand::Activate {
            alert: alert.clone(),
            focus,
        });
    }

    fn deactivate(&self, alert: &AlertDescriptor, reason: StopReason) {
        let _ = self.commands.send(RenderCommand::Deactivate {
            alert: alert.clone(),
            reason,
        });
    }

    fn set_focus(&self, alert: &AlertDescriptor, focus: FocusState) {
        let _ = self.commands.send(RenderCommand::SetFocus {
            alert: alert.clone(),
            focus,
        });
    }
}

pub(crate) fn record(token: &str, scheduled_time: i64) -> AlertRecord {
    AlertRecord {
        token: token.to_owned(),
        alert_type: AlertType::Alarm,
        state: AlertState::Set,
        scheduled_time,
        original_time: None,
        label: None,
    }
}

/// Scheduler wired to in-memory doubles.
pub(crate) struct Harness {
    pub scheduler: AlertScheduler,
    pub storage: MemoryAlertStorage,
    pub clock: ManualClock,
    pub timer: ManualTimer,
    pub render_timer: ManualTimer,
    pub renders: Receiver<RenderCommand>,
    pub events: Receiver<AlertInfo>,
    events_tx: Sender<AlertInfo>,
}

impl Harness {
    /// Build a scheduler over `storage` without initializing it.
    pub(crate) fn build(storage: MemoryAlertStorage, now: i64, config: &SchedulerConfig) -> Self {
        let clock = ManualClock::at(now);
        let timer = ManualTimer::default();
        let render_timer = ManualTimer::default();
        let (renderer, renders) = RecordingRenderer::new();
        let scheduler = AlertScheduler::with_parts(
            Box::new(storage.clone()),
            renderer,
            Arc::new(clock.clone()),
            Box::new(timer.clone()),
            Box::new(render_timer.clone()),
            config,
        )
        .unwrap();
        let (events_tx, events) = crossbeam_channel::unbounded();
        Self {
            scheduler,
            storage,
            clock,
            timer,
            render_timer,
            renders,
            events,
            events_tx,
        }
    }

    /// Initialized scheduler whose storage already holds `records`.
    pub(crate) fn with_records(records: Vec<AlertRecord>, now: i64) -> Self {
        let harness = Self::build(
            MemoryAlertStorage::with_records(records),
            now,
            &SchedulerConfig::default(),
        );
        harness.initialize().unwrap();
        harness
    }

    /// Initialized scheduler over an empty database.
    pub(crate) fn started(now: i64) -> Self {
        Self::with_records(Vec::new(), now)
    }

    pub(crate) fn initialize(&self) -> Result<()> {
        self.scheduler.initialize(Arc::new(self.events_tx.clone()))
    }

    pub(crate) fn schedule(&self, token: &str, time: i64) {
        let alert = crate::alert::Alert::new(token, AlertType::Alarm, time).unwrap();
        self.scheduler.schedule_alert(alert).unwrap();
    }

    pub(crate) fn next_event(&self) -> AlertInfo {
        self.events.recv_timeout(WAIT).expect("expected an alert event")
    }

    /// Next event, asserting its token and kind.
    pub(crate) fn expect_event(&self, token: &str, event: AlertEvent) -> AlertInfo {
        let info = self.next_event();
        assert_eq!((info.token(), info.event), (token, event), "unexpected event {info:?}");
        info
    }

    pub(crate) fn next_render(&self) -> RenderCommand {
        self.renders.recv_timeout(WAIT).expect("expected a render command")
    }

    /// Wait until queued work has drained, then assert nothing else was emitted.
    pub(crate) fn assert_quiet(&self) {
        self.scheduler.wait_idle();
        assert!(self.events.try_recv().is_err(), "unexpected extra event");
        assert!(self.renders.try_recv().is_err(), "unexpected extra render command");
    }

    /// Drive `token` from scheduled to rendering-confirmed with foreground focus.
    pub(crate) fn activate_and_start(&self, token: &str) {
        self.scheduler.update_focus(FocusState::Foreground);
        assert!(matches!(self.next_render(), RenderCommand::Activate { ref alert, .. } if alert.token == token));
        self.scheduler.on_alert_state_change(token, crate::renderer::RendererState::Started, "");
        self.expect_event(token, AlertEvent::Started);
        self.expect_event(token, AlertEvent::FocusEnteredForeground);
    }
}
