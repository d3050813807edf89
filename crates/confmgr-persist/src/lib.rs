//! confmgr persistence layer
//!
//! Moves configuration documents between memory and YAML files.
//!
//! # Guarantees
//!
//! - **Layout**: saved files contain exactly `__data__` and `__type_hints__`
//! - **No sharing**: anchors and aliases in a file become independent copies
//! - **Atomic**: a save writes a temporary file, reads it back, then renames;
//!   the target is never observed half-written
//! - **Backups**: the first save of a pre-existing file in a process copies
//!   it aside (see [`backup`])
//!
//! # Example
//!
//! ```rust,ignore
//! use confmgr_persist::{BackupPolicy, BackupLedger, YamlStore};
//!
//! let store = YamlStore::new(BackupPolicy::Disabled, BackupLedger::process());
//! let loaded = store.load("config/config.yaml".as_ref())?;
//! store.save("config/config.yaml".as_ref(), &loaded.document, now)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backup;
pub mod document;
pub mod error;
pub mod store;
mod yaml;

pub use backup::{backup_path, BackupLedger, BackupPolicy};
pub use document::{is_reserved_key, Document, LoadReport, DATA_KEY, HINTS_KEY};
pub use error::{LoadError, SaveError};
pub use store::{Loaded, SaveReport, StoreStats, YamlStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for persistence

    pub use crate::{BackupPolicy, Document, LoadError, SaveError, YamlStore};
}
