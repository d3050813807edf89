//! Owned background threads
//!
//! A [`BackgroundThread`] is a named OS thread plus the means to stop it.
//! Stopping signals the thread and joins it; dropping the handle stops it.
//! Threads never keep the process alive: returning from `main` ends the
//! process whether or not a background thread is running.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{SyncError, SyncResult};

/// Cooperative stop signal with an interruptible sleep
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopToken {
    /// Fresh, unsignalled token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the stop and wake any sleeper
    pub fn stop(&self) {
        *self.inner.stopped.lock() = true;
        self.inner.wake.notify_all();
    }

    /// True once [`stop`](Self::stop) was called
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Sleep for `timeout` or until stopped; true if stopped
    pub fn sleep(&self, timeout: Duration) -> bool {
        let mut stopped = self.inner.stopped.lock();
        if !*stopped {
            self.inner.wake.wait_for(&mut stopped, timeout);
        }
        *stopped
    }
}

/// A named background thread that is stopped and joined on drop
pub struct BackgroundThread {
    name: String,
    stop: Box<dyn Fn() + Send + Sync>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for BackgroundThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundThread")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl BackgroundThread {
    /// Spawn `body`; `stop` must make `body` return promptly
    ///
    /// # Errors
    /// Returns [`SyncError::Spawn`] if the thread cannot be created.
    pub fn spawn<S, B>(name: impl Into<String>, stop: S, body: B) -> SyncResult<Self>
    where
        S: Fn() + Send + Sync + 'static,
        B: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .map_err(|source| SyncError::Spawn {
                name: name.clone(),
                source,
            })?;
        Ok(Self {
            name,
            stop: Box::new(stop),
            handle: Some(handle),
        })
    }

    /// Spawn a loop driven by a [`StopToken`]
    ///
    /// # Errors
    /// Returns [`SyncError::Spawn`] if the thread cannot be created.
    pub fn spawn_with_token<B>(name: impl Into<String>, body: B) -> SyncResult<Self>
    where
        B: FnOnce(StopToken) + Send + 'static,
    {
        let token = StopToken::new();
        let for_body = token.clone();
        Self::spawn(name, move || token.stop(), move || body(for_body))
    }

    /// Thread name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the thread has not finished
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal and join; idempotent
    ///
    /// Called from the thread itself (the last owner was dropped there), the
    /// join is skipped and the thread exits on its own after the signal.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        (self.stop)();
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::warn!(thread = %self.name, "background thread panicked");
        }
    }
}

impl Drop for BackgroundThread {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn token_sleep_wakes_on_stop() {
        let token = StopToken::new();
        let sleeper = token.clone();
        let started = Instant::now();
        let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        token.stop();
        assert!(handle.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(token.is_stopped());
    }

    #[test]
    fn stop_is_idempotent_and_joins() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut worker = BackgroundThread::spawn_with_token("ticker", move |stop| {
            while !stop.sleep(Duration::from_millis(5)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
        assert_eq!(worker.name(), "ticker");
        thread::sleep(Duration::from_millis(30));
        worker.stop();
        assert!(!worker.is_running());
        let after = ticks.load(Ordering::SeqCst);
        worker.stop();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), after);
    }

    #[test]
    fn drop_stops_thread() {
        let token_seen = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&token_seen);
        let worker = BackgroundThread::spawn_with_token("dropper", move |stop| {
            stop.sleep(Duration::from_secs(30));
            seen.store(1, Ordering::SeqCst);
        })
        .unwrap();
        drop(worker);
        assert_eq!(token_seen.load(Ordering::SeqCst), 1);
    }
}
