//! Structured results returned by the version-control client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A submitted change, as returned by a changes query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub number: i64,
    pub user: String,
    pub description: String,
    pub time: DateTime<Utc>,
}

/// Action a locally-opened file is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileAction {
    Add,
    Edit,
    Delete,
    Branch,
    Integrate,
    MoveAdd,
    MoveDelete,
}

/// A file the user currently has open in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedFile {
    pub depot_path: String,
    pub action: FileAction,
}

/// Options for a sync operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncFlags {
    /// Report what would sync without transferring anything
    pub preview: bool,
    /// Overwrite writable files instead of reporting them as clobbers
    pub force: bool,
}

/// Result of a sync: what transferred and what was blocked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Depot paths that were synced (or would be, in preview)
    pub synced: Vec<String>,
    /// Depot paths blocked because a writable local file would be clobbered
    pub clobbered: Vec<String>,
}

/// One file within a described change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedFile {
    pub depot_path: String,
    pub size: u64,
    pub digest: Option<String>,
}

/// Full description of one change: metadata plus its file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDetails {
    pub number: i64,
    pub description: String,
    pub files: Vec<DescribedFile>,
}

/// The three coordinates of one mapped file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub depot_path: String,
    pub client_path: String,
    pub local_path: String,
}
