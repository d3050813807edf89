//! confmgr background machinery
//!
//! - [`AutosaveScheduler`]: coalesces bursts of mutations into one save
//! - [`FileWatcher`]: polls a file and reloads on external modification
//! - [`BackgroundThread`]: the owned thread both are built on
//!
//! Both components hold their target weakly, so a configuration manager
//! that is dropped takes its threads down with it, and neither thread ever
//! keeps the process alive.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod autosave;
pub mod error;
pub mod thread;
pub mod watcher;

pub use autosave::{AutosaveScheduler, AutosaveStats, AutosaveTarget};
pub use error::{SyncError, SyncResult};
pub use thread::{BackgroundThread, StopToken};
pub use watcher::{FileStamp, FileWatcher, ReloadTarget, SelfWriteGuard, WatcherState, WatcherStats};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
