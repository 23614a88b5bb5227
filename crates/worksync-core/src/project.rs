//! Project configuration
//!
//! A project file describes the depot location of a workspace, the roots it
//! syncs, and the project-specific hooks the engine runs around a sync.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Static description of one project, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Display name for logs
    pub name: String,
    /// Depot path of the workspace root, no trailing slash
    pub depot_root: String,
    /// Branch identifier stamped into version files
    pub branch: String,
    /// Depot roots to sync; defaults to everything under `depot_root`
    #[serde(default)]
    pub sync_roots: Vec<String>,
    /// Commands run after a successful sync, before the change commits
    #[serde(default)]
    pub post_sync_commands: Vec<String>,
    /// Force a clean build when the last built and target change straddle
    /// this changelist
    #[serde(default)]
    pub force_clean_above: Option<i64>,
    /// Command that regenerates project files
    #[serde(default)]
    pub project_file_generator: Option<String>,
    /// Solution or project file opened after a successful run
    #[serde(default)]
    pub solution_path: Option<String>,
}

impl ProjectConfig {
    /// Load a project configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProjectConfig` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::ProjectConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::ProjectConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(name = %config.name, depot_root = %config.depot_root, "Loaded project configuration");
        Ok(config)
    }

    /// Filespecs covering everything this project syncs.
    pub fn sync_filespecs(&self) -> Vec<String> {
        if self.sync_roots.is_empty() {
            vec![format!("{}/...", self.depot_root)]
        } else {
            self.sync_roots.clone()
        }
    }
}
