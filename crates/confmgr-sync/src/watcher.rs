//! Polling file watcher
//!
//! Checks a file's modification stamp every `interval` and asks its
//! [`ReloadTarget`] to reload when the file changed underneath it. Writes
//! made by the owner itself are bracketed by a [`SelfWriteGuard`], which
//! both suppresses ticks during the write and records the resulting stamp,
//! so the owner never reloads its own save.
//!
//! States: `Stopped ⇄ Running`. Transient errors (file missing, reload
//! failing on a half-written file) skip the tick without advancing the
//! observed stamp; the next tick tries again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::error::SyncResult;
use crate::thread::BackgroundThread;

/// Something that can re-read its file when it changes externally
pub trait ReloadTarget: Send + Sync {
    /// Replace in-memory state with the file's content
    ///
    /// # Errors
    /// Any failure; the watcher logs it and retries on the next tick.
    fn reload_from_disk(&self) -> anyhow::Result<()>;
}

/// Observable identity of a file version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    /// Current stamp of `path`
    ///
    /// # Errors
    /// Returns the IO error from reading metadata.
    pub fn read(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified()?,
            len: meta.len(),
        })
    }
}

/// Lifecycle of a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// No polling thread
    Stopped,
    /// Polling
    Running,
}

/// Counters for one watcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStats {
    /// Polls performed
    pub ticks: u64,
    /// External changes reloaded
    pub reloads: u64,
    /// Ticks skipped because of a transient error
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct WatchShared {
    last_seen: Mutex<Option<FileStamp>>,
    self_write: AtomicBool,
    ticks: AtomicU64,
    reloads: AtomicU64,
    skipped: AtomicU64,
}

/// Polls one file for external modification
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    interval: Duration,
    shared: Arc<WatchShared>,
    worker: Mutex<Option<BackgroundThread>>,
}

/// Marks an in-progress write by the watcher's owner
///
/// Dropping the guard records the file's new stamp as already seen and
/// clears the flag.
#[derive(Debug)]
#[must_use = "the write is only bracketed while the guard lives"]
pub struct SelfWriteGuard<'a> {
    watcher: &'a FileWatcher,
}

impl Drop for SelfWriteGuard<'_> {
    fn drop(&mut self) {
        if let Ok(stamp) = FileStamp::read(&self.watcher.path) {
            *self.watcher.shared.last_seen.lock() = Some(stamp);
        }
        self.watcher.shared.self_write.store(false, Ordering::SeqCst);
    }
}

impl FileWatcher {
    /// Watcher for `path`, polling every `interval`; starts stopped
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            shared: Arc::default(),
            worker: Mutex::new(None),
        }
    }

    /// Watched file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Poll interval
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> WatcherState {
        if self
            .worker
            .lock()
            .as_ref()
            .is_some_and(BackgroundThread::is_running)
        {
            WatcherState::Running
        } else {
            WatcherState::Stopped
        }
    }

    /// Start polling; a no-op while already running
    ///
    /// The current stamp of the file becomes the baseline.
    ///
    /// # Errors
    /// Returns [`crate::SyncError::Spawn`] if the thread cannot be created.
    pub fn start(&self, target: Weak<dyn ReloadTarget>) -> SyncResult<()> {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(BackgroundThread::is_running) {
            return Ok(());
        }
        *self.shared.last_seen.lock() = FileStamp::read(&self.path).ok();

        let shared = Arc::clone(&self.shared);
        let path = self.path.clone();
        let interval = self.interval;
        let thread = BackgroundThread::spawn_with_token("confmgr-watcher", move |stop| {
            while !stop.sleep(interval) {
                let Some(target) = target.upgrade() else {
                    break;
                };
                tick(&shared, &path, target.as_ref());
            }
        })?;
        *worker = Some(thread);
        tracing::info!(path = %self.path.display(), interval_ms = interval_ms(interval), "watcher started");
        Ok(())
    }

    /// Stop polling and join the thread; idempotent
    pub fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            drop(worker);
            tracing::info!(path = %self.path.display(), "watcher stopped");
        }
    }

    /// Bracket a write by the owner (see [`SelfWriteGuard`])
    pub fn begin_self_write(&self) -> SelfWriteGuard<'_> {
        self.shared.self_write.store(true, Ordering::SeqCst);
        SelfWriteGuard { watcher: self }
    }

    /// True while a [`SelfWriteGuard`] is alive
    #[must_use]
    pub fn is_self_writing(&self) -> bool {
        self.shared.self_write.load(Ordering::SeqCst)
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> WatcherStats {
        WatcherStats {
            ticks: self.shared.ticks.load(Ordering::Relaxed),
            reloads: self.shared.reloads.load(Ordering::Relaxed),
            skipped: self.shared.skipped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn interval_ms(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}

fn tick(shared: &WatchShared, path: &Path, target: &dyn ReloadTarget) {
    shared.ticks.fetch_add(1, Ordering::Relaxed);
    if shared.self_write.load(Ordering::SeqCst) {
        return;
    }
    let stamp = match FileStamp::read(path) {
        Ok(stamp) => stamp,
        Err(err) => {
            shared.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(path = %path.display(), error = %err, "watch tick skipped");
            return;
        }
    };
    let previous = *shared.last_seen.lock();
    if previous == Some(stamp) || shared.self_write.load(Ordering::SeqCst) {
        return;
    }

    match target.reload_from_disk() {
        Ok(()) => {
            let mut last = shared.last_seen.lock();
            // a self-write that finished meanwhile already recorded a newer stamp
            if *last == previous {
                *last = Some(stamp);
            }
            drop(last);
            shared.reloads.fetch_add(1, Ordering::Relaxed);
            tracing::info!(path = %path.display(), "reloaded config after external change");
        }
        Err(err) => {
            shared.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(path = %path.display(), error = %err, "reload failed, retrying next tick");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confmgr_test_utils::{external_write, wait_until, TempConfigDir};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Default)]
    struct Reloads {
        count: AtomicUsize,
        fail: AtomicBool,
    }

    impl ReloadTarget for Reloads {
        fn reload_from_disk(&self) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("half-written file");
            }
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn weak(target: &Arc<Reloads>) -> Weak<dyn ReloadTarget> {
        Arc::downgrade(target) as Weak<dyn ReloadTarget>
    }

    #[test]
    fn external_change_triggers_one_reload() {
        let dir = TempConfigDir::new();
        let path = dir.write("config.yaml", "a: 1\n");
        let target = Arc::new(Reloads::default());
        let watcher = FileWatcher::new(&path, Duration::from_millis(20));
        watcher.start(weak(&target)).unwrap();
        assert_eq!(watcher.state(), WatcherState::Running);

        external_write(&path, "a: 2\n");
        assert!(wait_until(Duration::from_secs(2), || {
            target.count.load(Ordering::SeqCst) == 1
        }));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(target.count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn own_writes_are_not_reloaded() {
        let dir = TempConfigDir::new();
        let path = dir.write("config.yaml", "a: 1\n");
        let target = Arc::new(Reloads::default());
        let watcher = FileWatcher::new(&path, Duration::from_millis(10));
        watcher.start(weak(&target)).unwrap();

        for n in 0..5 {
            let guard = watcher.begin_self_write();
            assert!(watcher.is_self_writing());
            external_write(&path, &format!("a: {n}{n}\n"));
            thread::sleep(Duration::from_millis(25));
            drop(guard);
        }
        assert!(!watcher.is_self_writing());
        thread::sleep(Duration::from_millis(100));
        assert_eq!(target.count.load(Ordering::SeqCst), 0);
        assert!(watcher.stats().ticks > 0);
    }

    #[test]
    fn failed_reload_is_retried() {
        let dir = TempConfigDir::new();
        let path = dir.write("config.yaml", "a: 1\n");
        let target = Arc::new(Reloads::default());
        target.fail.store(true, Ordering::SeqCst);
        let watcher = FileWatcher::new(&path, Duration::from_millis(15));
        watcher.start(weak(&target)).unwrap();

        external_write(&path, "a: [\n");
        assert!(wait_until(Duration::from_secs(2), || watcher.stats().skipped >= 2));
        target.fail.store(false, Ordering::SeqCst);
        assert!(wait_until(Duration::from_secs(2), || {
            target.count.load(Ordering::SeqCst) == 1
        }));
    }

    #[test]
    fn missing_file_skips_ticks() {
        let dir = TempConfigDir::new();
        let target = Arc::new(Reloads::default());
        let watcher = FileWatcher::new(dir.path("absent.yaml"), Duration::from_millis(10));
        watcher.start(weak(&target)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || watcher.stats().skipped >= 2));
        assert_eq!(target.count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_is_prompt_idempotent_and_restartable() {
        let dir = TempConfigDir::new();
        let path = dir.write("config.yaml", "a: 1\n");
        let target = Arc::new(Reloads::default());
        let watcher = FileWatcher::new(&path, Duration::from_secs(10));
        watcher.start(weak(&target)).unwrap();
        watcher.start(weak(&target)).unwrap();

        let begun = std::time::Instant::now();
        watcher.stop();
        assert!(begun.elapsed() < Duration::from_secs(2));
        watcher.stop();
        assert_eq!(watcher.state(), WatcherState::Stopped);

        watcher.start(weak(&target)).unwrap();
        assert_eq!(watcher.state(), WatcherState::Running);
    }
}
