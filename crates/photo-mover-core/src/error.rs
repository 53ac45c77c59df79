use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type used across the engine.
pub type MoverResult<T> = Result<T, MoverError>;

/// Everything that can go wrong while scanning a device or moving one item.
///
/// Scan-level variants (`DeviceUnavailable`, `EnumerationFailure`) abort only the
/// affected scan step. Per-item variants are downgraded to a `Failed` outcome by
/// the batch orchestrator. `MetadataUnavailable` is informational.
#[derive(Debug, Error)]
pub enum MoverError {
    /// No device or device session is reachable.
    #[error("device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    /// Listing a device container failed; its subtree is skipped.
    #[error("cannot list {folder}")]
    EnumerationFailure {
        folder: String,
        #[source]
        source: io::Error,
    },

    /// The device adapter refused to start a copy.
    #[error("copy could not be started: {reason}")]
    CopyTriggerFailure { reason: String },

    /// The copied file never stabilised at the expected path.
    #[error("timeout after {}s - file may still be copying", .waited.as_secs())]
    CompletionTimeout { path: PathBuf, waited: Duration },

    /// No capture timestamp could be found for a file.
    #[error("no capture date available for {}", .path.display())]
    MetadataUnavailable { path: PathBuf },

    /// A destination directory or file could not be created, deleted or renamed.
    #[error("cannot {operation} {}: {source}", .path.display())]
    DestinationUnwritable {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The batch was cancelled before this item started.
    #[error("operation cancelled")]
    Cancelled,

    /// The persisted configuration could not be read or written.
    #[error("configuration {operation} failed for {}", .path.display())]
    Config {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A required configuration field is empty.
    #[error("configuration field `{field}` must be set")]
    InvalidConfig { field: &'static str },
}

impl MoverError {
    pub(crate) fn unwritable(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::DestinationUnwritable {
            operation,
            path: path.into(),
            source,
        }
    }
}
