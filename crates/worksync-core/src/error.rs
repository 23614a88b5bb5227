//! Error types for worksync-core

use std::path::PathBuf;

/// Result type for worksync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in worksync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The run was canceled by its cancellation token
    #[error("Operation canceled")]
    Canceled,

    /// The shared toolchain slot could not be acquired in time
    #[error("Timed out waiting for another workspace to release the toolchain")]
    SlotTimeout,

    /// An external command could not be started
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Project configuration could not be loaded
    #[error("Failed to load project configuration at {path}: {message}")]
    ProjectConfig { path: PathBuf, message: String },

    /// Filesystem error from worksync-fs
    #[error(transparent)]
    Fs(#[from] worksync_fs::Error),

    /// Archive manifest error from worksync-archive
    #[error(transparent)]
    Archive(#[from] worksync_archive::Error),

    /// Build step error from worksync-steps
    #[error(transparent)]
    Steps(#[from] worksync_steps::Error),

    /// Version-control error from worksync-vcs
    #[error(transparent)]
    Vcs(#[from] worksync_vcs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
