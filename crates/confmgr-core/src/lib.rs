//! confmgr - live, file-backed configuration trees
//!
//! A process asks the [`Registry`] for the manager of a configuration file
//! and gets the same [`ConfigManager`] for the same file every time. Reads
//! and writes go to an in-memory tree; writes are saved to YAML after a
//! short quiet period, and edits made to the file by other processes are
//! picked up by a polling watcher.
//!
//! # Architecture
//!
//! ```text
//!   get_config_manager(options)
//!            │
//!            ▼
//!   ┌──────────────────┐   one per key    ┌────────────────────────────┐
//!   │     Registry     │ ───────────────► │       ConfigManager        │
//!   └──────────────────┘                  │  tree (RwLock<Document>)   │
//!                                         │   │ mutate ─► Autosave ──┐ │
//!                                         │   │                      ▼ │
//!                                         │   │        YamlStore::save │
//!                                         │   ▼                      │ │
//!                                         │ FileWatcher ◄─ self-write┘ │
//!                                         └────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use confmgr_core::prelude::*;
//!
//! let config = get_config_manager(&ManagerOptions::for_path("config/app.yaml"))?;
//! config.set("server.port", 8080)?;
//! let port: u16 = config.get_as_or("server.port", 80);
//!
//! let frozen = config.snapshot();
//! assert!(frozen.set("server.port", 1).is_err());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod derived;
pub mod error;
pub mod handle;
pub mod logging;
pub mod manager;
pub mod options;
pub mod registry;
pub mod resolve;
pub mod snapshot;
pub mod temporary;
pub mod testenv;

pub use derived::{DerivedProperty, CONFIG_FILE_PATH, DERIVED_PROPERTIES, FIRST_START_TIME};
pub use error::{ConfigError, ConfigResult, SnapshotError};
pub use handle::NodeHandle;
pub use logging::{init_json_tracing, init_tracing};
pub use manager::{generate_config_id, ConfigManager, FileState, ManagerStats, SetOptions};
pub use options::{ManagerOptions, DEFAULT_AUTOSAVE_DELAY, DEFAULT_WATCH_INTERVAL};
pub use registry::{get_config_manager, Registry};
pub use resolve::CacheKey;
pub use snapshot::{Snapshot, SnapshotView};
pub use temporary::TemporaryOverrides;

pub use confmgr_node::{ConfigNode, ConfigPath, FromValue, TypeHint, TypeHints, Value};
pub use confmgr_persist::BackupPolicy;
pub use confmgr_sync::WatcherState;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for configuration users

    pub use crate::{
        get_config_manager, ConfigError, ConfigManager, ConfigResult, ManagerOptions, Snapshot,
        SnapshotError, Value,
    };
}
