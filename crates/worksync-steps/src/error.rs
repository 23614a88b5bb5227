//! Error types for worksync-steps

use std::path::PathBuf;

/// Result type for worksync-steps operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in worksync-steps operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read step configuration at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse step configuration at {path}: {message}")]
    Parse { path: PathBuf, message: String },
}
