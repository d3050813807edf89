//! Error types for background threads

/// Errors from starting background work
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The OS refused to start a thread
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for sync operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;
