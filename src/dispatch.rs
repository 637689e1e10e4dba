//! Single-worker FIFO task queue.
//!
//! Observer notifications, renderer commands and renderer reports all run
//! here, one at a time, in submission order. Tasks are submitted while the
//! scheduler lock is held and executed after it is released.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error};

use crate::error::Result;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted closures sequentially on a dedicated thread.
///
/// The queue is unbounded: the worker itself submits follow-up tasks, and a
/// full bounded queue would block it forever.
pub(crate) struct SerialExecutor {
    sender: Mutex<Option<Sender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    stopped: Arc<AtomicBool>,
}

impl SerialExecutor {
    /// Spawn the worker thread.
    pub(crate) fn new(name: &str) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let stopped = Arc::new(AtomicBool::new(false));
        let worker_stopped = Arc::clone(&stopped);
        let handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run_worker(&receiver, &worker_stopped))?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker_id: handle.thread().id(),
            worker: Mutex::new(Some(handle)),
            stopped,
        })
    }

    /// Queue a task. Returns `false` once the executor has shut down.
    pub(crate) fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let Ok(guard) = self.sender.lock() else {
            return false;
        };
        match guard.as_ref() {
            Some(sender) => sender.send(Box::new(task)).is_ok(),
            None => false,
        }
    }

    /// Drop pending tasks and stop the worker.
    ///
    /// Waits for a task that is already running unless called from the
    /// worker itself.
    pub(crate) fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if std::thread::current().id() == self.worker_id {
                return;
            }
            if handle.join().is_err() {
                error!("alert dispatch worker panicked");
            }
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(receiver: &Receiver<Task>, stopped: &AtomicBool) {
    for task in receiver {
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!("alert dispatch task panicked");
        }
    }
    debug!("alert dispatch worker exiting");
}
