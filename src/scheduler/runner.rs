//! Alert scheduling core.
//!
//! All state lives behind one mutex. Observer notifications and renderer
//! commands are queued on a [`SerialExecutor`] while the lock is held and
//! delivered after it is released, so collaborators may call straight back
//! into the scheduler. Renderer reports travel the same queue before they
//! take the lock, which keeps them ordered with the commands that caused
//! them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::alert::{
    Alert, AlertDescriptor, AlertRecord, AlertState, FocusState, OfflineStoppedAlert,
    RendererOutcome, StopReason,
};
use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::dispatch::SerialExecutor;
use crate::error::{AlertsError, Result};
use crate::observer::{AlertEvent, AlertInfo, AlertObserver};
use crate::renderer::{RenderCommand, Renderer, RendererState};
use crate::scheduler::context::{AlertContext, AlertsContextInfo};
use crate::storage::AlertStorage;
use crate::timer::{RearmingTimer, ThreadTimer};

/// Ordering key for waiting alerts: due time, then token.
type AlertKey = (i64, String);

fn key_of(alert: &Alert) -> AlertKey {
    (alert.scheduled_time(), alert.token().to_owned())
}

fn focus_event(focus: FocusState) -> Option<AlertEvent> {
    match focus {
        FocusState::Foreground => Some(AlertEvent::FocusEnteredForeground),
        FocusState::Background => Some(AlertEvent::FocusEnteredBackground),
        FocusState::None => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    ShutDown,
}

struct SchedulerState {
    lifecycle: Lifecycle,
    storage: Option<Box<dyn AlertStorage>>,
    renderer: Option<Arc<dyn Renderer>>,
    observer: Option<Arc<dyn AlertObserver>>,
    timer: Box<dyn RearmingTimer>,
    /// Closes the active alert's rendering window.
    render_timer: Box<dyn RearmingTimer>,
    /// Alerts waiting for their time, in `Set` or `Snoozed`.
    scheduled: BTreeMap<AlertKey, Alert>,
    /// The single alert owned by the renderer.
    active: Option<Alert>,
    focus: FocusState,
}

impl SchedulerState {
    fn ensure_running(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Running => Ok(()),
            Lifecycle::Created => Err(AlertsError::NotInitialized),
            Lifecycle::ShutDown => Err(AlertsError::ShutDown),
        }
    }

    fn is_active_token(&self, token: &str) -> bool {
        self.active.as_ref().is_some_and(|a| a.token() == token)
    }

    fn scheduled_key(&self, token: &str) -> Option<AlertKey> {
        self.scheduled.keys().find(|(_, t)| t == token).cloned()
    }

    fn contains(&self, token: &str) -> bool {
        self.is_active_token(token) || self.scheduled_key(token).is_some()
    }

    fn insert(&mut self, alert: Alert) {
        self.scheduled.insert(key_of(&alert), alert);
    }

    /// Release the active alert and its rendering window.
    fn take_active(&mut self) -> Option<Alert> {
        self.render_timer.cancel();
        self.active.take()
    }

    fn take_scheduled(&mut self, token: &str) -> Option<Alert> {
        let key = self.scheduled_key(token)?;
        self.scheduled.remove(&key)
    }

    fn storage(&mut self) -> Result<&mut Box<dyn AlertStorage>> {
        self.storage.as_mut().ok_or(AlertsError::ShutDown)
    }

    fn erase_logged(&mut self, token: &str) {
        if let Some(storage) = self.storage.as_mut() {
            if let Err(e) = storage.erase(token) {
                warn!(token = %token, "failed to erase alert: {e}");
            }
        }
    }

    fn modify_logged(&mut self, record: &AlertRecord) {
        if let Some(storage) = self.storage.as_mut() {
            if let Err(e) = storage.modify(record) {
                warn!(token = %record.token, "failed to update stored alert: {e}");
            }
        }
    }
}

struct Inner {
    this: Weak<Inner>,
    state: Mutex<SchedulerState>,
    dispatch: SerialExecutor,
    clock: Arc<dyn Clock>,
    past_due_limit: Duration,
    max_rendering_time: Duration,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(
        &self,
        state: &SchedulerState,
        alert: AlertDescriptor,
        event: AlertEvent,
        reason: &str,
    ) {
        debug!(token = %alert.token, %event, "alert event");
        let Some(observer) = state.observer.clone() else {
            return;
        };
        let info = AlertInfo::new(alert, event, reason);
        if !self
            .dispatch
            .submit(move || observer.on_alert_state_change(&info))
        {
            debug!("alert dispatch closed, dropping {event} event");
        }
    }

    fn render(&self, state: &SchedulerState, command: RenderCommand) {
        let Some(renderer) = state.renderer.clone() else {
            return;
        };
        self.dispatch
            .submit(move || command.dispatch(renderer.as_ref()));
    }

    /// Point the timer at the earliest waiting alert.
    fn rearm_locked(&self, state: &mut SchedulerState) {
        state.timer.cancel();
        if state.active.is_some() {
            return;
        }
        let Some(head) = state.scheduled.values().next() else {
            return;
        };
        let token = head.token().to_owned();
        let scheduled_time = head.scheduled_time();
        let descriptor = head.descriptor();

        let now = match self.clock.now() {
            Ok(now) => now,
            Err(e) => {
                warn!(token = %token, "cannot arm alert timer: {e}");
                return;
            }
        };
        let delay = u64::try_from(scheduled_time.saturating_sub(now)).unwrap_or(0);
        if delay == 0 {
            self.notify(state, descriptor, AlertEvent::Ready, "");
            return;
        }

        let this = self.this.clone();
        let timer_token = token.clone();
        let armed = state.timer.arm(
            Duration::from_secs(delay),
            Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    inner.on_alert_ready(&timer_token);
                }
            }),
        );
        match armed {
            Ok(()) => debug!(token = %token, delay_secs = delay, "alert timer armed"),
            Err(e) => error!(token = %token, "failed to arm alert timer: {e}"),
        }
    }

    /// Hand the earliest waiting alert to the renderer.
    ///
    /// Focus alone decides; the head need not be due yet.
    fn activate_next_locked(&self, state: &mut SchedulerState) {
        if state.active.is_some() {
            return;
        }
        while let Some((_, mut alert)) = state.scheduled.pop_first() {
            let now = match self.clock.now() {
                Ok(now) => now,
                Err(e) => {
                    warn!(token = %alert.token(), "cannot activate alert: {e}");
                    state.insert(alert);
                    return;
                }
            };
            if alert.rendering_deadline(self.max_rendering_time) <= now {
                warn!(token = %alert.token(), "alert missed its rendering window");
                alert.mark_failed();
                state.erase_logged(alert.token());
                self.notify(
                    state,
                    alert.descriptor(),
                    AlertEvent::Error,
                    "rendering window elapsed",
                );
                continue;
            }
            if alert.scheduled_time() > now {
                info!(
                    token = %alert.token(),
                    early_secs = alert.scheduled_time() - now,
                    "activating alert before its due time"
                );
            }
            match alert.activate(state.focus) {
                Ok(command) => {
                    info!(token = %alert.token(), focus = %state.focus, "activating alert");
                    self.render(state, command);
                    let window = alert.rendering_deadline(self.max_rendering_time) - now;
                    self.arm_rendering_window(state, alert.token(), window);
                    state.active = Some(alert);
                }
                Err(e) => {
                    error!("failed to activate alert: {e}");
                    state.insert(alert);
                }
            }
            break;
        }
        self.rearm_locked(state);
    }

    fn arm_rendering_window(&self, state: &mut SchedulerState, token: &str, secs: i64) {
        let delay = Duration::from_secs(u64::try_from(secs).unwrap_or(0));
        let this = self.this.clone();
        let timer_token = token.to_owned();
        let armed = state.render_timer.arm(
            delay,
            Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    inner.on_rendering_window_closed(&timer_token);
                }
            }),
        );
        match armed {
            Ok(()) => debug!(token = %token, window_secs = secs, "rendering window armed"),
            Err(e) => error!(token = %token, "failed to arm rendering window: {e}"),
        }
    }

    fn on_rendering_window_closed(&self, token: &str) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.lifecycle != Lifecycle::Running {
            return;
        }
        let Some(active) = state.active.as_mut().filter(|a| a.token() == token) else {
            debug!(token = %token, "ignoring stale rendering window");
            return;
        };
        if let Some(command) = active.expire_rendering() {
            info!(token = %token, "rendering window closed, stopping alert");
            self.render(state, command);
        }
    }

    /// Reconcile persisted alerts with the current time.
    fn reload_locked(&self, state: &mut SchedulerState, records: Vec<AlertRecord>, now: i64) {
        for record in records {
            let token = record.token.clone();
            let mut alert = match Alert::from_record(record) {
                Ok(alert) => alert,
                Err(e) => {
                    warn!(token = %token, "dropping unusable stored alert: {e}");
                    state.erase_logged(&token);
                    continue;
                }
            };
            if state.contains(&token) {
                debug!(token = %token, "stored alert already loaded");
                continue;
            }
            if alert.state().is_terminal() {
                warn!(token = %token, state = %alert.state(), "dropping finished stored alert");
                state.erase_logged(&token);
                continue;
            }
            if alert.is_past_due(now, self.past_due_limit) {
                info!(token = %token, "alert went past due while offline");
                alert.mark_past_due();
                self.notify(state, alert.descriptor(), AlertEvent::PastDue, "");
                state.erase_logged(&token);
                continue;
            }
            if alert.state().is_rendering() {
                debug!(token = %token, state = %alert.state(), "resetting interrupted alert");
                alert.reset();
                state.modify_logged(&alert.to_record());
            }
            self.notify(state, alert.descriptor(), AlertEvent::ScheduledForLater, "");
            state.insert(alert);
        }
        info!(count = state.scheduled.len(), "alerts reloaded");
    }

    fn on_alert_ready(&self, token: &str) {
        let state = self.lock();
        if state.lifecycle != Lifecycle::Running {
            return;
        }
        if state.active.is_some() {
            debug!(token = %token, "alert ready while another is active");
            return;
        }
        match state.scheduled.values().next() {
            Some(head) if head.token() == token => {
                let descriptor = head.descriptor();
                info!(token = %token, "alert ready");
                self.notify(&state, descriptor, AlertEvent::Ready, "");
            }
            _ => debug!(token = %token, "ignoring stale alert timer"),
        }
    }

    fn handle_renderer_report(&self, token: &str, reported: RendererState, reason: &str) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.lifecycle != Lifecycle::Running {
            debug!(token = %token, ?reported, "scheduler not running, ignoring renderer report");
            return;
        }

        if let Some(active) = state.active.as_mut().filter(|a| a.token() == token) {
            let outcome = active.on_renderer_state_change(reported, reason);
            self.apply_active_outcome(state, outcome);
            return;
        }

        let Some(key) = state.scheduled_key(token) else {
            debug!(token = %token, ?reported, "renderer report for unknown alert");
            return;
        };
        let outcome = match state.scheduled.get_mut(&key) {
            Some(alert) => alert.on_renderer_state_change(reported, reason),
            None => return,
        };
        match outcome {
            RendererOutcome::Failed(message) => {
                if let Some(alert) = state.scheduled.remove(&key) {
                    state.erase_logged(token);
                    self.notify(state, alert.descriptor(), AlertEvent::Error, &message);
                    self.rearm_locked(state);
                }
            }
            _ => debug!(token = %token, ?reported, "ignoring renderer report for waiting alert"),
        }
    }

    fn apply_active_outcome(&self, state: &mut SchedulerState, outcome: RendererOutcome) {
        match outcome {
            RendererOutcome::Started => {
                let Some(active) = state.active.as_ref() else {
                    return;
                };
                let record = active.to_record();
                let descriptor = active.descriptor();
                let focus = active.focus();
                state.modify_logged(&record);
                info!(token = %record.token, "alert started");
                self.notify(state, descriptor.clone(), AlertEvent::Started, "");
                if let Some(event) = focus_event(focus) {
                    self.notify(state, descriptor, event, "");
                }
            }
            RendererOutcome::Snoozed => {
                let Some(alert) = state.take_active() else {
                    return;
                };
                state.modify_logged(&alert.to_record());
                info!(token = %alert.token(), until = alert.scheduled_time(), "alert snoozed");
                self.notify(state, alert.descriptor(), AlertEvent::Snoozed, "");
                state.insert(alert);
                self.rearm_locked(state);
            }
            RendererOutcome::Stopped(reason) => {
                self.finish_active(state, AlertEvent::Stopped, reason.as_str());
            }
            RendererOutcome::Completed => self.finish_active(state, AlertEvent::Completed, ""),
            RendererOutcome::Failed(message) => {
                self.finish_active(state, AlertEvent::Error, &message);
            }
            RendererOutcome::Ignored => debug!("ignoring renderer report for active alert"),
        }
    }

    /// Purge the active alert after a terminal renderer report.
    fn finish_active(&self, state: &mut SchedulerState, event: AlertEvent, reason: &str) {
        let Some(alert) = state.take_active() else {
            return;
        };
        info!(token = %alert.token(), %event, "alert finished");
        state.erase_logged(alert.token());
        self.notify(state, alert.descriptor(), event, reason);
        self.rearm_locked(state);
    }

    /// Stop the active alert, if any, without waiting for the renderer.
    fn deactivate_active_locked(&self, state: &mut SchedulerState, reason: StopReason) {
        let Some(active) = state.active.as_mut() else {
            return;
        };
        match active.deactivate(reason) {
            Ok(command) => {
                info!(token = %active.token(), %reason, "stopping alert");
                self.render(state, command);
            }
            Err(e) => debug!("cannot stop active alert: {e}"),
        }
    }
}

/// Orchestrates alarms, timers and reminders.
///
/// Cheap to clone; clones share one scheduler. A renderer typically holds a
/// clone to report progress via [`AlertScheduler::on_alert_state_change`].
#[derive(Clone)]
pub struct AlertScheduler {
    inner: Arc<Inner>,
}

impl AlertScheduler {
    /// Scheduler using the system clock and a thread-backed timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatch thread cannot be spawned.
    pub fn new(
        storage: Box<dyn AlertStorage>,
        renderer: Arc<dyn Renderer>,
        config: &SchedulerConfig,
    ) -> Result<Self> {
        Self::with_parts(
            storage,
            renderer,
            Arc::new(SystemClock),
            Box::new(ThreadTimer::new()),
            Box::new(ThreadTimer::new()),
            config,
        )
    }

    /// Scheduler with an explicit clock and timers.
    ///
    /// `timer` signals the next due alert; `render_timer` closes the active
    /// alert's rendering window.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatch thread cannot be spawned.
    pub fn with_parts(
        storage: Box<dyn AlertStorage>,
        renderer: Arc<dyn Renderer>,
        clock: Arc<dyn Clock>,
        timer: Box<dyn RearmingTimer>,
        render_timer: Box<dyn RearmingTimer>,
        config: &SchedulerConfig,
    ) -> Result<Self> {
        let dispatch = SerialExecutor::new("alerts-dispatch")?;
        let state = SchedulerState {
            lifecycle: Lifecycle::Created,
            storage: Some(storage),
            renderer: Some(renderer),
            observer: None,
            timer,
            render_timer,
            scheduled: BTreeMap::new(),
            active: None,
            focus: FocusState::None,
        };
        let inner = Arc::new_cyclic(|this| Inner {
            this: this.clone(),
            state: Mutex::new(state),
            dispatch,
            clock,
            past_due_limit: config.past_due_limit(),
            max_rendering_time: config.max_rendering_time(),
        });
        Ok(Self { inner })
    }

    /// Open storage, reconcile persisted alerts and start the timer.
    ///
    /// Falls back to creating a fresh database only when the existing one is
    /// missing or unusable; a busy or locked store is an error. Calling this
    /// again on a running scheduler only replaces the observer.
    ///
    /// # Errors
    ///
    /// Fails if storage can be neither opened nor created, if loading fails,
    /// if the clock is unavailable, or after [`AlertScheduler::shutdown`].
    pub fn initialize(&self, observer: Arc<dyn AlertObserver>) -> Result<()> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        match state.lifecycle {
            Lifecycle::ShutDown => return Err(AlertsError::ShutDown),
            Lifecycle::Running => {
                warn!("alert scheduler already initialized, replacing observer");
                state.observer = Some(observer);
                return Ok(());
            }
            Lifecycle::Created => {}
        }

        let storage = state.storage()?;
        match storage.open() {
            Ok(()) => {}
            Err(AlertsError::StorageUnusable(reason)) => {
                warn!("alerts storage unusable ({reason}), creating a new database");
                if let Err(e) = storage.create_database() {
                    error!("cannot create alerts storage: {e}");
                    return Err(e);
                }
            }
            Err(e) => {
                error!("cannot open alerts storage: {e}");
                return Err(e);
            }
        }
        let records = storage.load()?;
        let now = self.inner.clock.now()?;

        state.observer = Some(observer);
        self.inner.reload_locked(state, records, now);
        state.lifecycle = Lifecycle::Running;
        self.inner.rearm_locked(state);
        Ok(())
    }

    /// Add an alert. Scheduling a token that is already known succeeds
    /// without touching storage.
    ///
    /// # Errors
    ///
    /// Fails if the alert is past due, not waiting, cannot be persisted, or
    /// the clock is unavailable.
    pub fn schedule_alert(&self, alert: Alert) -> Result<()> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.ensure_running()?;

        if state.contains(alert.token()) {
            debug!(token = %alert.token(), "alert already scheduled");
            return Ok(());
        }
        if !matches!(alert.state(), AlertState::Set | AlertState::Snoozed) {
            return Err(AlertsError::InvalidTransition {
                token: alert.token().to_owned(),
                state: alert.state().to_string(),
                operation: "schedule",
            });
        }
        let now = self.inner.clock.now().inspect_err(|e| {
            warn!(token = %alert.token(), "cannot schedule alert: {e}");
        })?;
        if alert.is_past_due(now, self.inner.past_due_limit) {
            warn!(token = %alert.token(), "refusing past-due alert");
            return Err(AlertsError::PastDue {
                token: alert.token().to_owned(),
            });
        }
        if let Err(e) = state.storage()?.store(&alert.to_record()) {
            error!(token = %alert.token(), "failed to store alert: {e}");
            return Err(e);
        }

        info!(token = %alert.token(), kind = %alert.alert_type(), at = alert.scheduled_time(), "alert scheduled");
        state.insert(alert);
        self.inner.rearm_locked(state);
        Ok(())
    }

    /// Move a waiting alert to a new time.
    ///
    /// # Errors
    ///
    /// Fails for the active alert, unknown tokens, past-due times, or when
    /// the change cannot be persisted (the old time is then kept).
    pub fn reschedule_alert(&self, token: &str, new_time: i64) -> Result<()> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.ensure_running()?;

        if let Some(active) = state.active.as_ref().filter(|a| a.token() == token) {
            return Err(AlertsError::InvalidTransition {
                token: token.to_owned(),
                state: active.state().to_string(),
                operation: "reschedule",
            });
        }
        let now = self.inner.clock.now()?;
        let mut alert = state
            .take_scheduled(token)
            .ok_or_else(|| AlertsError::UnknownAlert(token.to_owned()))?;

        let previous = (alert.scheduled_time(), alert.state());
        let limit = i64::try_from(self.inner.past_due_limit.as_secs()).unwrap_or(i64::MAX);
        let result = if new_time.saturating_add(limit) < now {
            Err(AlertsError::PastDue {
                token: token.to_owned(),
            })
        } else {
            alert.update_scheduled_time(new_time).and_then(|()| {
                state.storage()?.modify(&alert.to_record()).inspect_err(|e| {
                    warn!(token = %token, "failed to persist rescheduled alert: {e}");
                })
            })
        };
        if result.is_err() {
            alert.restore_schedule(previous.0, previous.1);
        } else {
            info!(token = %token, at = new_time, "alert rescheduled");
        }
        state.insert(alert);
        self.inner.rearm_locked(state);
        result
    }

    /// Remove an alert.
    ///
    /// The active alert is asked to stop and disappears once the renderer
    /// confirms. A waiting alert is removed at once.
    ///
    /// # Errors
    ///
    /// Fails for unknown tokens.
    pub fn delete_alert(&self, token: &str) -> Result<()> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.ensure_running()?;

        if state.is_active_token(token) {
            self.inner
                .deactivate_active_locked(state, StopReason::AvsStop);
            return Ok(());
        }
        let Some(alert) = state.take_scheduled(token) else {
            debug!(token = %token, "delete for unknown alert");
            return Err(AlertsError::UnknownAlert(token.to_owned()));
        };
        state.erase_logged(token);
        info!(token = %token, "alert deleted");
        self.inner
            .notify(state, alert.descriptor(), AlertEvent::Deleted, "");
        self.inner.rearm_locked(state);
        Ok(())
    }

    /// Remove several alerts with a single storage transaction.
    ///
    /// Unknown tokens are skipped.
    ///
    /// # Errors
    ///
    /// Fails without changing anything if storage rejects the bulk erase.
    pub fn delete_alerts(&self, tokens: &[String]) -> Result<()> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.ensure_running()?;

        let mut waiting = Vec::new();
        let mut includes_active = false;
        for token in tokens {
            if state.is_active_token(token) {
                includes_active = true;
            } else if state.scheduled_key(token).is_some() {
                waiting.push(token.clone());
            } else {
                debug!(token = %token, "bulk delete skipping unknown alert");
            }
        }

        if let Err(e) = state.storage()?.bulk_erase(&waiting) {
            error!("failed to bulk-erase alerts: {e}");
            return Err(e);
        }
        for token in &waiting {
            if let Some(alert) = state.take_scheduled(token) {
                self.inner
                    .notify(state, alert.descriptor(), AlertEvent::Deleted, "");
            }
        }
        if includes_active {
            self.inner
                .deactivate_active_locked(state, StopReason::AvsStop);
        }
        info!(count = waiting.len() + usize::from(includes_active), "alerts deleted");
        self.inner.rearm_locked(state);
        Ok(())
    }

    /// Snooze the active alert until `new_time`.
    ///
    /// # Errors
    ///
    /// Fails unless `token` is the active alert and it is rendering.
    pub fn snooze_alert(&self, token: &str, new_time: i64) -> Result<()> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.ensure_running()?;

        let Some(active) = state.active.as_mut().filter(|a| a.token() == token) else {
            warn!(token = %token, "snooze for an alert that is not active");
            return Err(AlertsError::NotActive(token.to_owned()));
        };
        let command = active.snooze(new_time)?;
        info!(token = %token, until = new_time, "snoozing alert");
        self.inner.render(state, command);
        Ok(())
    }

    /// React to the host's focus arbiter.
    ///
    /// Gaining focus activates the earliest waiting alert even if it is not
    /// yet due; the host is expected to request focus only after `Ready`.
    /// Losing focus stops the active alert.
    pub fn update_focus(&self, focus: FocusState) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if state.ensure_running().is_err() {
            debug!(%focus, "focus change ignored, scheduler not running");
            return;
        }
        if state.focus == focus {
            return;
        }
        debug!(from = %state.focus, to = %focus, "alert focus changed");
        state.focus = focus;

        match focus {
            FocusState::Foreground | FocusState::Background => {
                let Some(active) = state.active.as_mut() else {
                    self.inner.activate_next_locked(state);
                    return;
                };
                if let Some(command) = active.set_focus_state(focus) {
                    let descriptor = active.descriptor();
                    self.inner.render(state, command);
                    if let Some(event) = focus_event(focus) {
                        self.inner.notify(state, descriptor, event, "");
                    }
                }
            }
            FocusState::None => {
                self.inner
                    .deactivate_active_locked(state, StopReason::LocalStop);
            }
        }
    }

    /// Timer expiry for `token`. Only notifies `Ready`; never activates.
    pub fn on_alert_ready(&self, token: &str) {
        self.inner.on_alert_ready(token);
    }

    /// Renderer progress report. Safe to call from any thread at any time.
    pub fn on_alert_state_change(&self, token: &str, state: RendererState, reason: &str) {
        let this = self.inner.this.clone();
        let token = token.to_owned();
        let reason = reason.to_owned();
        let queued = self.inner.dispatch.submit(move || {
            if let Some(inner) = this.upgrade() {
                inner.handle_renderer_report(&token, state, &reason);
            }
        });
        if !queued {
            debug!("scheduler shut down, dropping renderer report");
        }
    }

    /// Stop the active alert because the user stopped it on the device.
    pub fn on_local_stop(&self) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if state.ensure_running().is_ok() {
            self.inner
                .deactivate_active_locked(state, StopReason::LocalStop);
        }
    }

    /// Drop every alert, in memory and in storage.
    ///
    /// # Errors
    ///
    /// Memory is always cleared; the error reports a storage failure.
    pub fn clear_data(&self, reason: StopReason) -> Result<()> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.ensure_running()?;

        self.inner.deactivate_active_locked(state, reason);
        state.timer.cancel();
        let removed = std::mem::take(&mut state.scheduled);
        for alert in removed.values() {
            self.inner
                .notify(state, alert.descriptor(), AlertEvent::Deleted, "");
        }
        info!(count = removed.len(), %reason, "clearing alert data");
        state.storage()?.clear_database().inspect_err(|e| {
            error!("failed to clear alerts storage: {e}");
        })
    }

    /// Snapshot of scheduled and active alerts.
    pub fn context_info(&self) -> AlertsContextInfo {
        let state = self.inner.lock();
        let mut info = AlertsContextInfo::default();
        if let Some(active) = state.active.as_ref() {
            info.active_alerts.push(AlertContext::from(active));
            info.scheduled_alerts.push(AlertContext::from(active));
        }
        info.scheduled_alerts
            .extend(state.scheduled.values().map(AlertContext::from));
        info
    }

    pub fn focus_state(&self) -> FocusState {
        self.inner.lock().focus
    }

    /// Copy of the alert currently owned by the renderer.
    pub fn active_alert(&self) -> Option<AlertRecord> {
        self.inner.lock().active.as_ref().map(Alert::to_record)
    }

    /// Whether `token` is activating or playing.
    pub fn is_alert_active(&self, token: &str) -> bool {
        self.inner.lock().active.as_ref().is_some_and(|a| {
            a.token() == token && matches!(a.state(), AlertState::Activating | AlertState::Active)
        })
    }

    /// Copies of all known alerts, active first, then by due time.
    pub fn all_alerts(&self) -> Vec<AlertRecord> {
        let state = self.inner.lock();
        state
            .active
            .iter()
            .chain(state.scheduled.values())
            .map(Alert::to_record)
            .collect()
    }

    /// Remember an alert that was stopped while offline.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn save_offline_stopped_alert(&self, token: &str, scheduled_time: i64) -> Result<()> {
        let mut state = self.inner.lock();
        state.ensure_running()?;
        let event_time = self.inner.clock.now()?;
        state.storage()?.store_offline_alert(&OfflineStoppedAlert {
            token: token.to_owned(),
            scheduled_time,
            event_time,
        })
    }

    /// Alerts stopped while offline that have not been reported yet.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn offline_stopped_alerts(&self) -> Result<Vec<OfflineStoppedAlert>> {
        let mut state = self.inner.lock();
        state.ensure_running()?;
        state.storage()?.load_offline_alerts()
    }

    /// Forget an offline-stopped alert once it has been reported.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn delete_offline_stopped_alert(&self, token: &str) -> Result<()> {
        let mut state = self.inner.lock();
        state.ensure_running()?;
        state.storage()?.erase_offline_alert(token)
    }

    /// Tear down. Pending notifications are dropped and later callbacks
    /// become no-ops. Does not wait for the renderer.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.lock();
            if state.lifecycle == Lifecycle::ShutDown {
                return;
            }
            state.lifecycle = Lifecycle::ShutDown;
            state.timer.cancel();
            state.observer = None;
            state.renderer = None;
            state.storage = None;
            state.take_active();
            state.scheduled.clear();
        }
        self.inner.dispatch.shutdown();
        info!("alert scheduler shut down");
    }

    /// Block until work queued so far, and the work it queues, has run.
    #[cfg(test)]
    pub(crate) fn wait_idle(&self) {
        for _ in 0..3 {
            let (tx, rx) = crossbeam_channel::bounded::<()>(1);
            if !self.inner.dispatch.submit(move || {
                let _ = tx.send(());
            }) {
                return;
            }
            let _ = rx.recv_timeout(Duration::from_secs(5));
        }
    }
}
