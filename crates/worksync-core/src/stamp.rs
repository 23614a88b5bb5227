//! Version stamp files
//!
//! After a full sync the engine records the synced change in three files at
//! the workspace root so the built product can report what it was built
//! from: a JSON build descriptor, a C header, and an INI section. Each file
//! is rewritten only when its content changes, and all three are excluded
//! from sync so the server never clobbers local stamps.

use serde::Serialize;
use tracing::debug;
use worksync_fs::{WorkspacePath, write_text_if_changed};

use crate::Result;

pub const BUILD_VERSION_FILE: &str = "Build.version";
pub const VERSION_HEADER_FILE: &str = "Version.h";
pub const VERSION_INI_FILE: &str = "Version.ini";

/// Relative paths of the stamp files, used to exclude them from sync.
pub const STAMP_FILES: [&str; 3] = [BUILD_VERSION_FILE, VERSION_HEADER_FILE, VERSION_INI_FILE];

#[derive(Debug, Serialize)]
struct BuildVersion<'a> {
    #[serde(rename = "Changelist")]
    changelist: i64,
    #[serde(rename = "CompatibleChangelist")]
    compatible_changelist: i64,
    #[serde(rename = "BranchName")]
    branch_name: &'a str,
}

/// Writes version stamps into a workspace.
#[derive(Debug)]
pub struct VersionStamper {
    root: WorkspacePath,
    branch: String,
}

impl VersionStamper {
    pub fn new(root: WorkspacePath, branch: impl Into<String>) -> Self {
        Self {
            root,
            branch: branch.into(),
        }
    }

    /// Stamp `synced_change` and `compatible_change` into the workspace.
    ///
    /// The compatible change is the newest change at or below the synced
    /// change that touched code, so content-only syncs keep reporting the
    /// binary they match. Returns `true` if any file was rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if a stamp file cannot be written.
    pub fn stamp(&self, synced_change: i64, compatible_change: i64) -> Result<bool> {
        let build = BuildVersion {
            changelist: synced_change,
            compatible_changelist: compatible_change,
            branch_name: &self.branch,
        };
        let json = serde_json::to_string_pretty(&build)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let header = format!(
            "#define BUILD_CHANGELIST {synced_change}\n\
             #define BUILD_COMPATIBLE_CHANGELIST {compatible_change}\n\
             #define BUILD_BRANCH \"{}\"\n",
            self.branch
        );
        let ini = format!(
            "[Version]\n\
             Changelist={synced_change}\n\
             CompatibleChangelist={compatible_change}\n\
             BranchName={}\n",
            self.branch
        );

        let mut changed = false;
        changed |= write_text_if_changed(&self.root.join(BUILD_VERSION_FILE), &json)?;
        changed |= write_text_if_changed(&self.root.join(VERSION_HEADER_FILE), &header)?;
        changed |= write_text_if_changed(&self.root.join(VERSION_INI_FILE), &ini)?;

        debug!(synced_change, compatible_change, changed, "stamped workspace version");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use worksync_fs::read_text;

    #[test]
    fn writes_all_three_stamp_files() {
        let dir = tempdir().unwrap();
        let root = WorkspacePath::new(dir.path());
        let stamper = VersionStamper::new(root.clone(), "//dev/main");

        assert!(stamper.stamp(100, 97).unwrap());

        let json = read_text(&root.join(BUILD_VERSION_FILE)).unwrap();
        assert!(json.contains("\"Changelist\": 100"));
        assert!(json.contains("\"CompatibleChangelist\": 97"));
        assert!(json.contains("\"BranchName\": \"//dev/main\""));

        let header = read_text(&root.join(VERSION_HEADER_FILE)).unwrap();
        assert!(header.contains("#define BUILD_CHANGELIST 100"));
        assert!(header.contains("#define BUILD_COMPATIBLE_CHANGELIST 97"));

        let ini = read_text(&root.join(VERSION_INI_FILE)).unwrap();
        assert!(ini.contains("Changelist=100"));
    }

    #[test]
    fn restamping_same_change_touches_nothing() {
        let dir = tempdir().unwrap();
        let root = WorkspacePath::new(dir.path());
        let stamper = VersionStamper::new(root, "//dev/main");

        assert!(stamper.stamp(100, 100).unwrap());
        assert!(!stamper.stamp(100, 100).unwrap());
        assert!(stamper.stamp(101, 100).unwrap());
    }
}
