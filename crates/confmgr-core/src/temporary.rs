//! Scoped overrides
//!
//! [`ConfigManager::temporary`] applies a set of overrides and returns a
//! [`TemporaryOverrides`] guard. When the guard drops (normal scope exit,
//! early return or unwinding panic) the tree is restored to the snapshot
//! taken before the overrides were applied, and the restored tree is saved.

use std::ops::Deref;

use crate::manager::ConfigManager;
use crate::snapshot::Snapshot;

/// Guard restoring a manager's tree on drop
#[derive(Debug)]
#[must_use = "the overrides are undone as soon as the guard is dropped"]
pub struct TemporaryOverrides<'a> {
    manager: &'a ConfigManager,
    previous: Option<Snapshot>,
}

impl<'a> TemporaryOverrides<'a> {
    pub(crate) fn new(manager: &'a ConfigManager, previous: Snapshot) -> Self {
        Self {
            manager,
            previous: Some(previous),
        }
    }

    /// Drop without restoring
    pub(crate) fn disarm(mut self) {
        self.previous = None;
    }

    /// Tree as it was before the overrides
    #[must_use]
    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }
}

impl Deref for TemporaryOverrides<'_> {
    type Target = ConfigManager;

    fn deref(&self) -> &ConfigManager {
        self.manager
    }
}

impl Drop for TemporaryOverrides<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if !self.manager.restore(&previous) {
                tracing::warn!(
                    path = %self.manager.config_path().display(),
                    "temporary overrides restored in memory only"
                );
            }
        }
    }
}
