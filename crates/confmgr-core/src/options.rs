//! Manager construction options
//!
//! ```rust,ignore
//! let options = ManagerOptions::new()
//!     .with_path("config/app.yaml")
//!     .with_autosave_delay(Duration::from_millis(250))
//!     .watch(false);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use confmgr_persist::BackupPolicy;

/// Default quiet period before a debounced save
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(100);

/// Default file watcher poll interval
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// How to open (or create) a managed configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Explicit file location; resolved from the working directory if unset
    pub path: Option<PathBuf>,
    /// Create an empty file when none exists
    pub auto_create: bool,
    /// Reload when the file changes on disk
    pub watch: bool,
    /// Quiet period before a debounced save
    pub autosave_delay: Duration,
    /// How often the watcher polls
    pub watch_interval: Duration,
    /// Redirect the file into an isolated temporary location
    pub test_mode: bool,
    /// Overrides the stored first-start time
    pub first_start_time: Option<NaiveDateTime>,
    /// Backup behaviour for the first save in this process
    pub backup: BackupPolicy,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            path: None,
            auto_create: true,
            watch: true,
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            watch_interval: DEFAULT_WATCH_INTERVAL,
            test_mode: false,
            first_start_time: None,
            backup: BackupPolicy::default(),
        }
    }
}

impl ManagerOptions {
    /// Defaults: resolved path, auto-create, watching, 100 ms debounce
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for an explicit file
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self::new().with_path(path)
    }

    /// Set the explicit file location
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set whether a missing file is created
    #[must_use]
    pub fn auto_create(mut self, enabled: bool) -> Self {
        self.auto_create = enabled;
        self
    }

    /// Set whether external changes are reloaded
    #[must_use]
    pub fn watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    /// Set the debounce quiet period
    #[must_use]
    pub fn with_autosave_delay(mut self, delay: Duration) -> Self {
        self.autosave_delay = delay;
        self
    }

    /// Set the watcher poll interval
    #[must_use]
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Set test mode
    #[must_use]
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    /// Override the first-start time
    #[must_use]
    pub fn with_first_start_time(mut self, at: NaiveDateTime) -> Self {
        self.first_start_time = Some(at);
        self
    }

    /// Set the backup policy
    #[must_use]
    pub fn with_backup(mut self, policy: BackupPolicy) -> Self {
        self.backup = policy;
        self
    }
}
