//! Debounced autosave
//!
//! Every mutation calls [`AutosaveScheduler::notify`], which pushes a single
//! deadline `delay` into the future. One timer thread sleeps until the
//! deadline stops moving, then asks its [`AutosaveTarget`] to save:
//!
//! ```text
//! notify  notify notify                       notify
//!   │       │      │                            │
//!   ▼       ▼      ▼                            ▼
//! ──┬───────┬──────┬────── delay ──────►save    ┬─── delay ───►save
//! ```
//!
//! Mutations that land while a save is running start the next window. A
//! failed save is logged and not retried; the target stays dirty until the
//! next mutation or an explicit save.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::SyncResult;
use crate::thread::BackgroundThread;

/// Something that can be saved when the debounce window closes
pub trait AutosaveTarget: Send + Sync {
    /// Persist pending changes
    ///
    /// # Errors
    /// Any failure; it is logged by the scheduler and otherwise ignored.
    fn autosave(&self) -> anyhow::Result<()>;
}

/// Counters for one scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutosaveStats {
    /// Calls to [`AutosaveScheduler::notify`]
    pub signals: u64,
    /// Debounce windows that closed and invoked the target
    pub fired: u64,
    /// Invocations that returned an error
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Timer {
    deadline: Option<Instant>,
    shutdown: bool,
}

#[derive(Debug)]
struct Shared {
    delay: Duration,
    timer: Mutex<Timer>,
    wake: Condvar,
    signals: AtomicU64,
    fired: AtomicU64,
    failed: AtomicU64,
}

/// Coalesces bursts of change signals into single saves
#[derive(Debug)]
pub struct AutosaveScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<BackgroundThread>>,
}

impl AutosaveScheduler {
    /// Scheduler with the given quiet period; no thread runs until
    /// [`start`](Self::start)
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                delay,
                timer: Mutex::new(Timer::default()),
                wake: Condvar::new(),
                signals: AtomicU64::new(0),
                fired: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Quiet period after the last signal
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.shared.delay
    }

    /// Start the timer thread; a no-op if it is already running
    ///
    /// The scheduler holds `target` weakly: once the target is gone the
    /// thread exits at its next deadline.
    ///
    /// # Errors
    /// Returns [`crate::SyncError::Spawn`] if the thread cannot be created.
    pub fn start(&self, target: Weak<dyn AutosaveTarget>) -> SyncResult<()> {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(BackgroundThread::is_running) {
            return Ok(());
        }
        self.shared.timer.lock().shutdown = false;

        let for_stop = Arc::clone(&self.shared);
        let for_body = Arc::clone(&self.shared);
        let thread = BackgroundThread::spawn(
            "confmgr-autosave",
            move || {
                for_stop.timer.lock().shutdown = true;
                for_stop.wake.notify_all();
            },
            move || run(&for_body, &target),
        )?;
        *worker = Some(thread);
        Ok(())
    }

    /// Record a change: (re)arm the deadline `delay` from now
    pub fn notify(&self) {
        self.shared.signals.fetch_add(1, Ordering::Relaxed);
        let mut timer = self.shared.timer.lock();
        timer.deadline = Some(Instant::now() + self.shared.delay);
        drop(timer);
        self.shared.wake.notify_all();
    }

    /// Disarm a pending deadline; true if one was pending
    pub fn cancel(&self) -> bool {
        let pending = self.shared.timer.lock().deadline.take().is_some();
        self.shared.wake.notify_all();
        pending
    }

    /// True while a deadline is armed
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.timer.lock().deadline.is_some()
    }

    /// Stop the timer thread, discarding any pending deadline
    pub fn shutdown(&self) {
        let worker = self.worker.lock().take();
        self.shared.timer.lock().deadline = None;
        drop(worker);
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> AutosaveStats {
        AutosaveStats {
            signals: self.shared.signals.load(Ordering::Relaxed),
            fired: self.shared.fired.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }
}

fn run(shared: &Shared, target: &Weak<dyn AutosaveTarget>) {
    let mut timer = shared.timer.lock();
    loop {
        if timer.shutdown {
            return;
        }
        match timer.deadline {
            None => shared.wake.wait(&mut timer),
            Some(deadline) if Instant::now() < deadline => {
                shared.wake.wait_until(&mut timer, deadline);
            }
            Some(_) => {
                timer.deadline = None;
                let Some(target) = target.upgrade() else {
                    return;
                };
                // the target may be dropped here; its teardown takes the lock
                MutexGuard::unlocked(&mut timer, move || {
                    fire(shared, target.as_ref());
                    drop(target);
                });
            }
        }
    }
}

fn fire(shared: &Shared, target: &dyn AutosaveTarget) {
    shared.fired.fetch_add(1, Ordering::Relaxed);
    match target.autosave() {
        Ok(()) => tracing::trace!("debounced save completed"),
        Err(err) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %err, "debounced save failed, changes stay pending");
        }
    }
}
