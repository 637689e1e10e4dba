//! One-shot re-armable timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::debug;

use crate::error::{AlertsError, Result};

/// Callback fired when a timer expires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Timer that counts down to a single callback.
///
/// Arming replaces any countdown in progress.
pub trait RearmingTimer: Send {
    /// Start counting down `delay`, then invoke `callback`.
    fn arm(&mut self, delay: Duration, callback: TimerCallback) -> Result<()>;

    /// Stop the countdown without firing. No-op when idle.
    fn cancel(&mut self);

    /// Whether a countdown is in progress.
    fn is_active(&self) -> bool;
}

#[derive(Default)]
struct Countdown {
    /// Bumped on every arm so a superseded countdown cannot fire.
    epoch: u64,
    cancel: Option<Sender<()>>,
}

/// [`RearmingTimer`] that waits on a short-lived background thread.
///
/// Cancelling drops the countdown's channel, which wakes the thread
/// immediately; it never waits for a callback in progress.
#[derive(Default)]
pub struct ThreadTimer {
    countdown: Arc<Mutex<Countdown>>,
}

impl ThreadTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RearmingTimer for ThreadTimer {
    fn arm(&mut self, delay: Duration, callback: TimerCallback) -> Result<()> {
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(1);
        let epoch = {
            let mut countdown = self
                .countdown
                .lock()
                .map_err(|e| AlertsError::Timer(e.to_string()))?;
            countdown.epoch = countdown.epoch.wrapping_add(1);
            countdown.cancel = Some(cancel_tx);
            countdown.epoch
        };

        let shared = Arc::clone(&self.countdown);
        std::thread::Builder::new()
            .name("alerts-timer".to_owned())
            .spawn(move || {
                if cancel_rx.recv_timeout(delay) != Err(RecvTimeoutError::Timeout) {
                    return;
                }
                let current = match shared.lock() {
                    Ok(mut countdown) if countdown.epoch == epoch => {
                        countdown.cancel.take();
                        true
                    }
                    _ => false,
                };
                if current {
                    callback();
                } else {
                    debug!("superseded alert timer expired");
                }
            })
            .map_err(|e| AlertsError::Timer(format!("failed to spawn timer thread: {e}")))?;
        Ok(())
    }

    fn cancel(&mut self) {
        if let Ok(mut countdown) = self.countdown.lock() {
            countdown.epoch = countdown.epoch.wrapping_add(1);
            countdown.cancel.take();
        }
    }

    fn is_active(&self) -> bool {
        self.countdown
            .lock()
            .map(|countdown| countdown.cancel.is_some())
            .unwrap_or(false)
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
