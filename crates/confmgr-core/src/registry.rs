//! Per-path singleton registry
//!
//! Exactly one [`ConfigManager`] exists per [`CacheKey`] in a registry.
//! Resolution is single-flight per key:
//!
//! ```text
//!   resolve(k) ──► slot(k) ──lock──► Some(m) ──────────────► m
//!                                  └► None ─► open(k) ─ok──► store, m
//!                                          │         └err──► drop slot, err
//!                                          └► slot dropped ─► retry
//! ```
//!
//! Construction for one key never blocks resolution of another, and a
//! failed construction leaves nothing behind, so the next call retries.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use confmgr_persist::BackupLedger;

use crate::error::ConfigResult;
use crate::manager::ConfigManager;
use crate::options::ManagerOptions;
use crate::resolve::CacheKey;

type Slot = Arc<Mutex<Option<ConfigManager>>>;

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// Map from cache key to its one manager
#[derive(Debug)]
pub struct Registry {
    slots: DashMap<CacheKey, Slot>,
    ledger: Arc<BackupLedger>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry sharing the process-wide backup ledger
    #[must_use]
    pub fn new() -> Self {
        Self::with_ledger(BackupLedger::process())
    }

    /// Empty registry with its own backup ledger
    #[must_use]
    pub fn with_ledger(ledger: Arc<BackupLedger>) -> Self {
        Self {
            slots: DashMap::new(),
            ledger,
        }
    }

    /// The process-wide registry
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Manager for `options`, creating it on first use
    ///
    /// # Errors
    /// Working directory lookup, load or creation failures. Nothing is
    /// registered on error.
    pub fn resolve(&self, options: &ManagerOptions) -> ConfigResult<ConfigManager> {
        let key = CacheKey::for_options(options)?;
        self.resolve_key(options, key)
    }

    /// [`resolve`](Self::resolve) with an explicit working directory
    ///
    /// # Errors
    /// As [`resolve`](Self::resolve).
    pub fn resolve_in(&self, options: &ManagerOptions, cwd: &Path) -> ConfigResult<ConfigManager> {
        self.resolve_key(options, CacheKey::derive(options, cwd))
    }

    fn resolve_key(&self, options: &ManagerOptions, key: CacheKey) -> ConfigResult<ConfigManager> {
        loop {
            let slot = Arc::clone(
                self.slots
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(None)))
                    .value(),
            );

            let mut guard = slot.lock();
            if let Some(manager) = guard.as_ref() {
                return Ok(manager.clone());
            }
            // a failed construction may have unregistered this slot while we waited
            if !self.is_current(&key, &slot) {
                continue;
            }

            return match ConfigManager::open(options, key.clone(), Arc::clone(&self.ledger)) {
                Ok(manager) => {
                    *guard = Some(manager.clone());
                    Ok(manager)
                }
                Err(err) => {
                    drop(guard);
                    self.slots.remove_if(&key, |_, current| {
                        Arc::ptr_eq(current, &slot)
                            && current.try_lock().is_some_and(|m| m.is_none())
                    });
                    tracing::warn!(key = %key, error = %err, "config manager construction failed");
                    Err(err)
                }
            };
        }
    }

    fn is_current(&self, key: &CacheKey, slot: &Slot) -> bool {
        self.slots
            .get(key)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), slot))
    }

    /// Slot handles, copied out so no shard lock is held while they are locked
    fn registered(&self) -> Vec<(CacheKey, Slot)> {
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Registered manager for `key`, without creating one
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<ConfigManager> {
        let slot = Arc::clone(self.slots.get(key)?.value());
        let manager = slot.lock().clone();
        manager
    }

    /// Number of registered managers
    #[must_use]
    pub fn len(&self) -> usize {
        self.registered()
            .into_iter()
            .filter(|(_, slot)| slot.lock().is_some())
            .count()
    }

    /// True if no manager is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of registered managers
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        self.registered()
            .into_iter()
            .filter(|(_, slot)| slot.lock().is_some())
            .map(|(key, _)| key)
            .collect()
    }

    /// Unregister `key`; the manager lives on while handles exist
    pub fn remove(&self, key: &CacheKey) -> Option<ConfigManager> {
        let (_, slot) = self.slots.remove(key)?;
        let manager = slot.lock().take();
        manager
    }

    /// Unregister every manager without touching their files
    pub fn reset(&self) {
        self.slots.clear();
        tracing::debug!("config registry reset");
    }

    /// Alias for [`reset`](Self::reset)
    pub fn clear(&self) {
        self.reset();
    }
}

/// Manager for `options` from the process-wide registry
///
/// # Errors
/// As [`Registry::resolve`].
pub fn get_config_manager(options: &ManagerOptions) -> ConfigResult<ConfigManager> {
    Registry::global().resolve(options)
}
