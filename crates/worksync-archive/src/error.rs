//! Error types for worksync-archive

use std::path::PathBuf;

/// Result type for worksync-archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in worksync-archive operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest signature mismatch (found {found:02x?})")]
    BadSignature { found: [u8; 4] },

    #[error("Unsupported manifest format version {found}")]
    UnsupportedVersion { found: u32 },

    #[error("Manifest data is truncated")]
    Truncated,

    #[error("Manifest entry path is not valid UTF-8")]
    PathNotUtf8,

    #[error("Archive entry has an unusable path: {path}")]
    UnsafeEntryPath { path: String },

    #[error(transparent)]
    Fs(#[from] worksync_fs::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
