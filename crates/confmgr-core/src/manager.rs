//! The configuration manager
//!
//! A [`ConfigManager`] owns one live configuration tree bound to one file.
//! Handles are cheap clones of a shared core; every clone obtained from a
//! [`crate::Registry`] for the same key is the same manager.
//!
//! # File state
//!
//! ```text
//!            mutate                 window closes / save()
//!  Loaded ───────────► Dirty ─────────────────────────► Saving ──► Loaded
//!    ▲                   │                                 │ (fails: Dirty)
//!    │   external change │ (reload wins, edits dropped)    │
//!    └──── Reloading ◄───┴─────────────────────────────────┘
//! ```
//!
//! Saves and reloads of one manager never overlap; mutations only contend
//! for the tree lock and never wait on file I/O.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use chrono::{Local, NaiveDateTime};
use confmgr_node::{ConfigNode, ConfigPath, FromValue, TypeHint, Value};
use confmgr_persist::{
    BackupLedger, Document, LoadError, LoadReport, SaveReport, StoreStats, YamlStore,
};
use confmgr_sync::{
    AutosaveScheduler, AutosaveStats, AutosaveTarget, FileWatcher, ReloadTarget, WatcherState,
    WatcherStats,
};
use parking_lot::{Mutex, RwLock};

use crate::derived::{self, FIRST_START_TIME};
use crate::error::{ConfigError, ConfigResult};
use crate::handle::NodeHandle;
use crate::options::ManagerOptions;
use crate::resolve::CacheKey;
use crate::snapshot::Snapshot;
use crate::temporary::TemporaryOverrides;

/// Where a manager's tree stands relative to its file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Tree matches what was last loaded or saved
    Loaded,
    /// Tree has changes not yet written
    Dirty,
    /// A save is in progress
    Saving,
    /// A reload is in progress
    Reloading,
}

const IDLE: u8 = 0;
const SAVING: u8 = 1;
const RELOADING: u8 = 2;

/// Per-write options for [`ConfigManager::set_with`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOptions {
    /// Declared type to persist alongside the value
    pub type_hint: Option<TypeHint>,
    /// Whether the write arms the debounced save
    pub autosave: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            type_hint: None,
            autosave: true,
        }
    }
}

impl SetOptions {
    /// Autosaving write without an explicit type hint
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist `hint` for the written path
    #[must_use]
    pub fn with_type_hint(mut self, hint: TypeHint) -> Self {
        self.type_hint = Some(hint);
        self
    }

    /// Leave the change for an explicit [`ConfigManager::save`]
    #[must_use]
    pub fn without_autosave(mut self) -> Self {
        self.autosave = false;
        self
    }
}

/// Counters across a manager's components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    /// Loads, saves and backups
    pub store: StoreStats,
    /// Debounce signals and fired saves
    pub autosave: AutosaveStats,
    /// Watcher activity, if watching was ever enabled
    pub watcher: Option<WatcherStats>,
}

/// Handle to a live, file-backed configuration tree
#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub(crate) inner: Arc<ManagerInner>,
}

#[derive(Debug)]
pub(crate) struct ManagerInner {
    key: CacheKey,
    path: PathBuf,
    store: YamlStore,
    document: RwLock<Document>,
    io: Mutex<()>,
    phase: AtomicU8,
    mutations: AtomicU64,
    saved: AtomicU64,
    explicit_start: Option<NaiveDateTime>,
    started_at: NaiveDateTime,
    autosave: AutosaveScheduler,
    watcher: Option<FileWatcher>,
    closed: AtomicBool,
    last_backup: Mutex<Option<PathBuf>>,
}

/// Fresh identifier for a configuration (random UUID v4)
#[must_use]
pub fn generate_config_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ConfigManager {
    /// Load or create the file for `key` and start background work
    ///
    /// Performs exactly one load, or one creation when the file is absent.
    /// On error nothing keeps running and nothing is written.
    pub(crate) fn open(
        options: &ManagerOptions,
        key: CacheKey,
        ledger: Arc<BackupLedger>,
    ) -> ConfigResult<Self> {
        let now = Local::now().naive_local();
        let path = key.resolve_file(now);
        let store = YamlStore::new(options.backup, ledger);

        let (mut document, mut needs_save, created) = match store.load(&path) {
            Ok(loaded) => (loaded.document, loaded.report.needs_rewrite(), false),
            Err(LoadError::NotFound { .. }) if options.auto_create => (Document::empty(), true, true),
            Err(LoadError::NotFound { .. }) => return Err(ConfigError::NotFound(path)),
            Err(err) => return Err(err.into()),
        };

        let (started_at, changed) =
            apply_managed_keys(&mut document, &path, options.first_start_time, now)?;
        needs_save |= changed;

        let inner = Arc::new(ManagerInner {
            key,
            store,
            document: RwLock::new(document),
            io: Mutex::new(()),
            phase: AtomicU8::new(IDLE),
            mutations: AtomicU64::new(0),
            saved: AtomicU64::new(0),
            explicit_start: options.first_start_time,
            started_at,
            autosave: AutosaveScheduler::new(options.autosave_delay),
            watcher: options
                .watch
                .then(|| FileWatcher::new(path.clone(), options.watch_interval)),
            closed: AtomicBool::new(false),
            last_backup: Mutex::new(None),
            path,
        });

        if needs_save {
            inner.mutations.fetch_add(1, Ordering::SeqCst);
            if let Err(err) = inner.save_now() {
                if created {
                    return Err(err);
                }
                tracing::warn!(path = %inner.path.display(), error = %err, "initial rewrite failed");
            }
        }

        let autosave_target = Arc::downgrade(&inner) as Weak<dyn AutosaveTarget>;
        inner.autosave.start(autosave_target)?;
        if let Some(watcher) = &inner.watcher {
            watcher.start(Arc::downgrade(&inner) as Weak<dyn ReloadTarget>)?;
        }

        tracing::info!(
            path = %inner.path.display(),
            key = %inner.key,
            created,
            watch = inner.watcher.is_some(),
            "config manager ready"
        );
        Ok(Self { inner })
    }

    /// True if both handles refer to the same manager
    #[inline]
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Registry key this manager was created under
    #[inline]
    #[must_use]
    pub fn cache_key(&self) -> &CacheKey {
        &self.inner.key
    }

    /// Resolved location of the backing file
    #[inline]
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.inner.path
    }

    /// Value of the read-only `config_file_path` property
    ///
    /// Always equal to [`config_path`](Self::config_path).
    #[must_use]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_as(derived::CONFIG_FILE_PATH)
            .unwrap_or_else(|| self.inner.path.clone())
    }

    /// Directory holding the backing file
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        self.inner.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Backup copy taken by this manager's first save, if any
    #[must_use]
    pub fn last_backup_path(&self) -> Option<PathBuf> {
        self.inner.last_backup.lock().clone()
    }

    /// When this configuration was first started
    ///
    /// Priority: explicit option, then the value stored in the file, then
    /// the time the manager was created.
    #[must_use]
    pub fn first_start_time(&self) -> NaiveDateTime {
        self.inner.first_start_time()
    }

    /// Fresh random identifier (see [`generate_config_id`])
    #[must_use]
    pub fn generate_config_id(&self) -> String {
        generate_config_id()
    }

    // ---- reads -----------------------------------------------------------

    /// Deep copy of the value at a dotted path
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        let path = path.parse::<ConfigPath>().ok()?;
        self.inner.get_at(&path)
    }

    /// Value at `path`, or `default` if absent
    #[must_use]
    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.get(path).unwrap_or_else(|| default.into())
    }

    /// Value at `path` read as `T`; `None` if absent or not convertible
    #[must_use]
    pub fn get_as<T: FromValue>(&self, path: &str) -> Option<T> {
        self.get(path).and_then(|value| T::from_value(&value).ok())
    }

    /// Value at `path` read as `T`, or `default`
    #[must_use]
    pub fn get_as_or<T: FromValue>(&self, path: &str, default: T) -> T {
        self.get_as(path).unwrap_or(default)
    }

    /// Value at `path` read as a filesystem path
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<PathBuf> {
        self.get_as(path)
    }

    /// True if a value exists at `path`
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        path.parse::<ConfigPath>()
            .is_ok_and(|path| self.inner.document.read().data.get_path(&path).is_some())
    }

    /// Top-level keys in order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .document
            .read()
            .data
            .keys()
            .map(str::to_string)
            .collect()
    }

    /// Deep copy of the whole tree
    #[must_use]
    pub fn to_node(&self) -> ConfigNode {
        self.inner.document.read().data.clone()
    }

    /// Type hint declared for `path`
    #[must_use]
    pub fn type_hint(&self, path: &str) -> Option<TypeHint> {
        let path = path.parse::<ConfigPath>().ok()?;
        self.inner.document.read().type_hints.get(&path).cloned()
    }

    /// Attribute-style handle for a top-level key
    ///
    /// # Errors
    /// [`confmgr_node::PathError::NotAnIdentifier`] for names that are not
    /// identifier-shaped.
    pub fn attr(&self, name: &str) -> ConfigResult<NodeHandle> {
        NodeHandle::root(Arc::downgrade(&self.inner)).attr(name)
    }

    // ---- writes ----------------------------------------------------------

    /// Assign `value` at a dotted path, creating intermediate nodes
    ///
    /// # Errors
    /// Malformed paths, read-only properties and layout keys are refused
    /// before anything changes.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> ConfigResult<()> {
        self.set_with(path, value, SetOptions::default())
    }

    /// [`set`](Self::set) with explicit [`SetOptions`]
    ///
    /// # Errors
    /// As [`set`](Self::set).
    pub fn set_with(
        &self,
        path: &str,
        value: impl Into<Value>,
        options: SetOptions,
    ) -> ConfigResult<()> {
        let path: ConfigPath = path.parse()?;
        self.inner.set_at(&path, value.into(), &options)
    }

    /// Apply several assignments as one change
    ///
    /// Every path is validated first; if any is refused nothing changes.
    /// The debounced save is armed once.
    ///
    /// # Errors
    /// The first refused assignment.
    pub fn update<I, K, V>(&self, changes: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut prepared = Vec::new();
        for (path, value) in changes {
            let path: ConfigPath = path.as_ref().parse()?;
            let value = prepare_value(&path, value.into())?;
            prepared.push((path, value));
        }
        if prepared.is_empty() {
            return Ok(());
        }
        self.inner.mutate(true, |document| {
            for (path, value) in prepared {
                write_value(document, &path, value, None);
            }
        });
        Ok(())
    }

    /// Remove the value at `path`, returning it
    ///
    /// # Errors
    /// Malformed paths, read-only properties and managed keys.
    pub fn remove(&self, path: &str) -> ConfigResult<Option<Value>> {
        let path: ConfigPath = path.parse()?;
        self.inner.remove_at(&path)
    }

    /// Declare a type hint for `path` and arm the debounced save
    ///
    /// # Errors
    /// Malformed paths, and paths at or below a managed key.
    pub fn set_type_hint(&self, path: &str, hint: TypeHint) -> ConfigResult<()> {
        let path: ConfigPath = path.parse()?;
        derived::check_managed_subtree(&path)?;
        self.inner.mutate(true, |document| {
            document.type_hints.insert(&path, hint);
        });
        Ok(())
    }

    // ---- persistence -----------------------------------------------------

    /// Write the tree to disk now, cancelling any pending debounced save
    ///
    /// Failures are logged and reported as `false`; the tree stays dirty.
    pub fn save(&self) -> bool {
        match self.try_save() {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(path = %self.inner.path.display(), error = %err, "save failed");
                false
            }
        }
    }

    /// [`save`](Self::save) returning the error
    ///
    /// # Errors
    /// Any [`confmgr_persist::SaveError`].
    pub fn try_save(&self) -> ConfigResult<SaveReport> {
        self.inner.autosave.cancel();
        self.inner.save_now()
    }

    /// Replace the tree with the file's current content
    ///
    /// Unsaved changes are discarded. On failure the tree is unchanged.
    pub fn reload(&self) -> bool {
        match self.try_reload() {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(path = %self.inner.path.display(), error = %err, "reload failed");
                false
            }
        }
    }

    /// [`reload`](Self::reload) returning the error
    ///
    /// # Errors
    /// Any [`LoadError`].
    pub fn try_reload(&self) -> ConfigResult<LoadReport> {
        self.inner.reload_now()
    }

    // ---- snapshots -------------------------------------------------------

    /// Read-only, serialisable copy of the tree and its type hints
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let document = self.inner.document.read();
        Snapshot::new(
            document.data.clone(),
            document.type_hints.clone(),
            Some(self.inner.path.clone()),
        )
    }

    /// Replace the tree wholesale with `snapshot` and save
    ///
    /// Derived properties are re-stamped for this manager. Returns whether
    /// the save succeeded; the in-memory restore happens either way.
    pub fn restore(&self, snapshot: &Snapshot) -> bool {
        let mut incoming = Document::new(snapshot.data().clone(), snapshot.type_hints().clone());
        derived::stamp(&mut incoming.data, &mut incoming.type_hints, &self.inner.path);
        self.inner.autosave.cancel();
        self.inner.mutate(false, |document| {
            incoming.header = std::mem::take(&mut document.header);
            *document = incoming;
        });
        self.save()
    }

    /// Apply `overrides` until the returned guard is dropped
    ///
    /// The guard restores the tree as it was before the overrides, however
    /// the scope is left (including by panic).
    ///
    /// # Errors
    /// As [`update`](Self::update); nothing is applied and no guard is
    /// returned.
    pub fn temporary<I, K, V>(&self, overrides: I) -> ConfigResult<TemporaryOverrides<'_>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let guard = TemporaryOverrides::new(self, self.snapshot());
        match self.update(overrides) {
            Ok(()) => Ok(guard),
            Err(err) => {
                guard.disarm();
                Err(err)
            }
        }
    }

    // ---- lifecycle -------------------------------------------------------

    /// Current [`FileState`]
    #[must_use]
    pub fn file_state(&self) -> FileState {
        match self.inner.phase.load(Ordering::SeqCst) {
            SAVING => FileState::Saving,
            RELOADING => FileState::Reloading,
            _ if self.inner.is_dirty() => FileState::Dirty,
            _ => FileState::Loaded,
        }
    }

    /// True if the tree has unsaved changes
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.is_dirty()
    }

    /// State of the file watcher
    #[must_use]
    pub fn watcher_state(&self) -> WatcherState {
        self.inner
            .watcher
            .as_ref()
            .map_or(WatcherState::Stopped, FileWatcher::state)
    }

    /// Stop reloading on external change; idempotent
    pub fn stop_watching(&self) {
        if let Some(watcher) = &self.inner.watcher {
            watcher.stop();
        }
    }

    /// Resume watching if the manager was created with watching enabled
    ///
    /// # Errors
    /// [`ConfigError::Background`] if the thread cannot be started.
    pub fn start_watching(&self) -> ConfigResult<()> {
        if let Some(watcher) = &self.inner.watcher {
            watcher.start(Arc::downgrade(&self.inner) as Weak<dyn ReloadTarget>)?;
        }
        Ok(())
    }

    /// Counters across store, autosave and watcher
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            store: self.inner.store.stats(),
            autosave: self.inner.autosave.stats(),
            watcher: self.inner.watcher.as_ref().map(FileWatcher::stats),
        }
    }

    /// Stop background work and flush pending changes once
    ///
    /// Later mutations are kept in memory and only written by an explicit
    /// [`save`](Self::save). Returns false if the final flush failed.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return true;
        }
        self.stop_watching();
        self.inner.autosave.shutdown();
        tracing::debug!(path = %self.inner.path.display(), "config manager closed");
        if self.inner.is_dirty() {
            self.save()
        } else {
            true
        }
    }
}

impl ManagerInner {
    fn is_dirty(&self) -> bool {
        self.mutations.load(Ordering::SeqCst) != self.saved.load(Ordering::SeqCst)
    }

    fn first_start_time(&self) -> NaiveDateTime {
        self.document
            .read()
            .data
            .get(FIRST_START_TIME)
            .and_then(Value::as_datetime)
            .unwrap_or(self.started_at)
    }

    pub(crate) fn get_at(&self, path: &ConfigPath) -> Option<Value> {
        self.document.read().data.get_path(path).cloned()
    }

    pub(crate) fn set_at(
        &self,
        path: &ConfigPath,
        value: Value,
        options: &SetOptions,
    ) -> ConfigResult<()> {
        let value = prepare_value(path, value)?;
        let hint = options.type_hint.clone();
        self.mutate(options.autosave, |document| {
            write_value(document, path, value, hint);
        });
        Ok(())
    }

    pub(crate) fn remove_at(&self, path: &ConfigPath) -> ConfigResult<Option<Value>> {
        derived::check_managed_subtree(path)?;
        let removed = self.mutate(true, |document| {
            document.type_hints.remove_subtree(path);
            document.data.remove_path(path)
        });
        Ok(removed)
    }

    /// Run `f` on the document under the write lock and mark the tree dirty
    fn mutate<R>(&self, autosave: bool, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = {
            let mut document = self.document.write();
            let result = f(&mut document);
            self.mutations.fetch_add(1, Ordering::SeqCst);
            result
        };
        if autosave && !self.closed.load(Ordering::SeqCst) {
            self.autosave.notify();
        }
        result
    }

    fn save_now(&self) -> ConfigResult<SaveReport> {
        let _io = self.io.lock();
        let _phase = PhaseGuard::enter(&self.phase, SAVING);
        let (document, generation) = {
            let document = self.document.read();
            (document.clone(), self.mutations.load(Ordering::SeqCst))
        };

        let _self_write = self.watcher.as_ref().map(FileWatcher::begin_self_write);
        let report = self
            .store
            .save(&self.path, &document, self.first_start_time())?;
        self.saved.fetch_max(generation, Ordering::SeqCst);
        if let Some(backup) = &report.backup {
            *self.last_backup.lock() = Some(backup.clone());
        }
        Ok(report)
    }

    fn reload_now(&self) -> ConfigResult<LoadReport> {
        let _io = self.io.lock();
        let _phase = PhaseGuard::enter(&self.phase, RELOADING);
        let loaded = self.store.load(&self.path)?;
        let mut document = loaded.document;
        apply_managed_keys(
            &mut document,
            &self.path,
            self.explicit_start,
            self.first_start_time(),
        )?;

        self.autosave.cancel();
        {
            let mut current = self.document.write();
            *current = document;
            self.saved
                .store(self.mutations.load(Ordering::SeqCst), Ordering::SeqCst);
        }
        tracing::debug!(path = %self.path.display(), "reloaded config");
        Ok(loaded.report)
    }
}

impl AutosaveTarget for ManagerInner {
    fn autosave(&self) -> anyhow::Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        self.save_now()?;
        Ok(())
    }
}

impl ReloadTarget for ManagerInner {
    fn reload_from_disk(&self) -> anyhow::Result<()> {
        self.reload_now()?;
        Ok(())
    }
}

struct PhaseGuard<'a>(&'a AtomicU8);

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a AtomicU8, value: u8) -> Self {
        phase.store(value, Ordering::SeqCst);
        Self(phase)
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::SeqCst);
    }
}

/// Validate an assignment and normalise managed values
fn prepare_value(path: &ConfigPath, value: Value) -> ConfigResult<Value> {
    derived::check_assignable(path, Some(&value))?;
    if path.len() == 1 && path.last() == Some(FIRST_START_TIME) {
        return Ok(Value::DateTime(NaiveDateTime::from_value(&value)?));
    }
    Ok(value)
}

/// Store `value` at `path` and bring the type hints in line with it
fn write_value(document: &mut Document, path: &ConfigPath, value: Value, hint: Option<TypeHint>) {
    let hints = &mut document.type_hints;
    hints.remove_subtree(path);
    let mut ancestor = path.parent();
    while let Some(parent) = ancestor {
        if parent.is_root() {
            break;
        }
        hints.remove(&parent);
        ancestor = parent.parent();
    }
    match hint {
        Some(hint) => {
            hints.insert(path, hint);
        }
        None => hints.record_implied(path, &value),
    }
    document.data.set_path(path, value);
}

/// Write `first_start_time` and the derived keys into a freshly read document
///
/// Returns the effective first-start time and whether the document changed.
fn apply_managed_keys(
    document: &mut Document,
    path: &Path,
    explicit: Option<NaiveDateTime>,
    fallback: NaiveDateTime,
) -> ConfigResult<(NaiveDateTime, bool)> {
    let stored = document
        .data
        .get(FIRST_START_TIME)
        .and_then(|value| NaiveDateTime::from_value(value).ok());
    let first_start = explicit.or(stored).unwrap_or(fallback);

    let mut changed = false;
    let value = Value::DateTime(first_start);
    if document.data.get(FIRST_START_TIME) != Some(&value) {
        document.data.insert(FIRST_START_TIME, value);
        changed = true;
    }
    let key = ConfigPath::key(FIRST_START_TIME)?;
    if document.type_hints.get(&key) != Some(&TypeHint::DateTime) {
        document.type_hints.insert(&key, TypeHint::DateTime);
        changed = true;
    }
    changed |= derived::stamp(&mut document.data, &mut document.type_hints, path);
    Ok((first_start, changed))
}
