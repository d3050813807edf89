//! Once-per-process backups
//!
//! The first save of a file in a process copies what was on disk before it
//! into a timestamped location next to the file:
//!
//! ```text
//! <dir>/backup/<YYYYMMDD>/<HHMMSS>/<stem>_<YYYYMMDD>_<HHMMSS>.yaml
//! ```
//!
//! The timestamp is the process's first-start time, so every file backed up
//! by one run lands in the same directory. A [`BackupLedger`] remembers which
//! files have been handled; the process-wide ledger outlives any registry.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// Whether saves back up the previous file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackupPolicy {
    /// Never back up
    Disabled,
    /// Copy the pre-existing file once per process (see module docs)
    #[default]
    Timestamped,
}

/// Files already backed up in this process
#[derive(Debug, Default)]
pub struct BackupLedger {
    claimed: Mutex<HashSet<PathBuf>>,
}

static PROCESS_LEDGER: Lazy<Arc<BackupLedger>> = Lazy::new(|| Arc::new(BackupLedger::new()));

impl BackupLedger {
    /// Fresh, empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The ledger shared by everything in this process
    #[must_use]
    pub fn process() -> Arc<Self> {
        Arc::clone(&PROCESS_LEDGER)
    }

    /// Mark `path` as handled; true only for the first claim
    pub fn claim(&self, path: &Path) -> bool {
        self.claimed.lock().insert(path.to_path_buf())
    }

    /// True if `path` was already claimed
    #[must_use]
    pub fn is_claimed(&self, path: &Path) -> bool {
        self.claimed.lock().contains(path)
    }
}

/// Where the backup of `config_path` taken at `stamp` goes
#[must_use]
pub fn backup_path(config_path: &Path, stamp: NaiveDateTime) -> PathBuf {
    let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let date = stamp.format("%Y%m%d").to_string();
    let time = stamp.format("%H%M%S").to_string();
    let stem = config_path
        .file_stem()
        .map_or_else(|| "config".into(), |s| s.to_string_lossy());
    dir.join("backup")
        .join(&date)
        .join(&time)
        .join(format!("{stem}_{date}_{time}.yaml"))
}

/// Copy `config_path` to its backup location
///
/// # Errors
/// Returns the IO error from creating the directory or copying the file.
pub fn write_backup(config_path: &Path, stamp: NaiveDateTime) -> io::Result<PathBuf> {
    let target = backup_path(config_path, stamp);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(config_path, &target)?;
    Ok(target)
}
