//! Error types for the persistence layer
//!
//! - [`LoadError`]: reading and parsing a configuration file
//! - [`SaveError`]: rendering, writing, verifying and replacing it

use std::path::PathBuf;

/// Errors while loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file does not exist
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    /// The file exists but could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML
    #[error("syntax error in {path}: {message}")]
    Syntax { path: PathBuf, message: String },

    /// Valid YAML, but not shaped like a configuration document
    #[error("unexpected layout in {path}: {message}")]
    Layout { path: PathBuf, message: String },
}

impl LoadError {
    /// Classify an IO error for `path`
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Create syntax error for path
    pub fn syntax_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Path of the file that failed to load
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::Syntax { path, .. }
            | Self::Layout { path, .. } => path,
        }
    }
}

/// Errors while saving a configuration file
///
/// Whatever the variant, the file that was on disk before the save is left
/// untouched.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The tree could not be rendered as YAML
    #[error("failed to render {path}: {message}")]
    Serialize { path: PathBuf, message: String },

    /// Creating directories or writing the temporary file failed
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The temporary file did not read back as what was meant to be written
    #[error("verification of {path} failed: {message}")]
    Verification { path: PathBuf, message: String },

    /// Moving the temporary file over the target failed
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SaveError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
