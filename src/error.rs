//! Error types for MirrorCopy
//!
//! Only setup and orchestration failures surface as errors. Per-entry
//! problems (an unopenable file, a directory that cannot be mirrored) are
//! logged and skipped, and a failed copy cancels the pipeline instead of
//! unwinding through the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for MirrorCopy operations
#[derive(Error, Debug)]
pub enum MirrorCopyError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File or directory not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Source and destination overlap
    #[error("Destination overlaps source: {0}")]
    SameSourceAndDestination(PathBuf),

    /// Invalid path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Thread spawn or join failure
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// Shutdown signal handler could not be installed
    #[error("Signal handler error: {0}")]
    SignalError(String),
}

impl MirrorCopyError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for MirrorCopy operations
pub type Result<T> = std::result::Result<T, MirrorCopyError>;

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| MirrorCopyError::io(path, e))
    }
}
