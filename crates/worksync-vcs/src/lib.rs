//! Version-control client abstraction for Worksync
//!
//! The sync engine talks to the version-control server exclusively through
//! the [`VcsClient`] trait defined here; this crate also provides the
//! background [`ChangesMonitor`] that feeds the engine the latest submitted
//! change numbers, classified as code or content.

pub mod client;
pub mod error;
pub mod monitor;
pub mod types;

pub use client::VcsClient;
pub use error::{Error, Result};
pub use monitor::{CODE_EXTENSIONS, ChangesMonitor, MonitorSnapshot, is_code_change};
pub use types::{
    ChangeDetails, ChangeSummary, DescribedFile, FileAction, OpenedFile, PathMapping, SyncFlags,
    SyncSummary,
};
