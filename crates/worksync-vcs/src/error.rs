//! Error types for worksync-vcs

/// Result type for worksync-vcs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur talking to the version-control server
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server rejected or failed an operation
    #[error("{operation} failed for {path}: {message}")]
    OperationFailed {
        operation: String,
        path: String,
        message: String,
    },

    /// A path has no client mapping
    #[error("Path is not mapped in this workspace: {path}")]
    NotMapped { path: String },

    /// Local I/O while spooling server data
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn operation(
        operation: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}
