//! Error types for the configuration manager
//!
//! [`ConfigError`] wraps every lower layer; [`SnapshotError`] is separate so
//! that an attempt to mutate a snapshot can never be mistaken for a failed
//! write to a live tree.

use std::path::PathBuf;

use confmgr_node::{ConversionError, PathError};
use confmgr_persist::{LoadError, SaveError};
use confmgr_sync::SyncError;

/// Errors from the configuration manager
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Malformed dotted path or attribute name
    #[error(transparent)]
    Path(#[from] PathError),

    /// Stored value cannot be read as the requested type
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Loading the file failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Saving the file failed
    #[error(transparent)]
    Save(#[from] SaveError),

    /// A background thread could not be started
    #[error(transparent)]
    Background(#[from] SyncError),

    /// The file does not exist and auto-creation is off
    #[error("config file not found and auto_create is disabled: {0}")]
    NotFound(PathBuf),

    /// Assignment to a property that mirrors another value
    #[error("'{property}' is read-only; it always mirrors {derived_from}")]
    ReadOnlyProperty {
        property: String,
        derived_from: &'static str,
    },

    /// Key reserved by the file layout
    #[error("'{0}' uses a key reserved by the file layout")]
    ReservedKey(String),

    /// Write that would restructure or drop a key the manager maintains
    #[error("'{path}' would overwrite the managed key '{key}'")]
    ManagedKey { path: String, key: &'static str },

    /// A handle outlived its manager
    #[error("the configuration manager behind this handle was dropped")]
    ManagerDropped,

    /// The working directory could not be determined
    #[error("cannot determine working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
}

impl ConfigError {
    /// True for errors that leave the live tree unchanged because the
    /// operation was refused up front
    #[must_use]
    pub fn is_rejected_write(&self) -> bool {
        matches!(
            self,
            Self::Path(_)
                | Self::ReadOnlyProperty { .. }
                | Self::ReservedKey(_)
                | Self::ManagedKey { .. }
        )
    }
}

/// Errors from snapshots
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Snapshots are read-only
    #[error("snapshot is read-only; cannot assign '{path}'")]
    Immutable { path: String },

    /// Malformed dotted path
    #[error(transparent)]
    Path(#[from] PathError),

    /// Encoding or decoding the transport form failed
    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result type for manager operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
