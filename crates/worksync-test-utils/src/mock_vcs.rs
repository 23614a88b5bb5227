//! Scripted in-memory version-control client
//!
//! Implements [`VcsClient`] against state configured by the test, and
//! records every mutating call so scenarios can assert exactly which files
//! were synced, force-synced, or resolved.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use worksync_vcs::{
    ChangeDetails, ChangeSummary, DescribedFile, Error, FileAction, OpenedFile, PathMapping,
    Result, SyncFlags, SyncSummary, VcsClient,
};

#[derive(Default)]
struct MockState {
    changes: Vec<ChangeSummary>,
    details: HashMap<i64, ChangeDetails>,
    opened: Vec<OpenedFile>,
    files_to_sync: Vec<String>,
    clobbered: Vec<String>,
    unresolved: Vec<String>,
    auto_resolve_succeeds: bool,
    downloads: HashMap<String, Vec<u8>>,
    // Recorded calls
    synced: Vec<String>,
    force_synced: Vec<String>,
    resolved: Vec<String>,
    downloaded: Vec<(String, i64)>,
}

/// A scripted [`VcsClient`] for tests.
pub struct MockVcs {
    depot_root: String,
    local_root: String,
    state: Mutex<MockState>,
}

impl MockVcs {
    /// Create a mock serving `depot_root` (e.g. `//depot/project`) mapped to
    /// `local_root` on disk.
    pub fn new(depot_root: impl Into<String>, local_root: impl Into<String>) -> Self {
        Self {
            depot_root: depot_root.into().trim_end_matches('/').to_string(),
            local_root: local_root.into().trim_end_matches('/').to_string(),
            state: Mutex::new(MockState {
                auto_resolve_succeeds: true,
                ..MockState::default()
            }),
        }
    }

    /// Depot paths a preview sync reports as needing transfer.
    pub fn set_files_to_sync(&self, files: Vec<String>) {
        self.lock().files_to_sync = files;
    }

    /// Depot paths the server reports as clobber-blocked on a normal sync.
    pub fn set_clobbered(&self, files: Vec<String>) {
        self.lock().clobbered = files;
    }

    pub fn set_opened(&self, files: Vec<OpenedFile>) {
        self.lock().opened = files;
    }

    /// Files with pending resolves, and whether auto-resolve clears them.
    pub fn set_unresolved(&self, files: Vec<String>, auto_resolve_succeeds: bool) {
        let mut state = self.lock();
        state.unresolved = files;
        state.auto_resolve_succeeds = auto_resolve_succeeds;
    }

    /// Register a submitted change with its file list.
    pub fn add_change(&self, number: i64, description: &str, files: &[&str]) {
        let mut state = self.lock();
        state.changes.push(ChangeSummary {
            number,
            user: "tester".to_string(),
            description: description.to_string(),
            time: Utc::now(),
        });
        state.changes.sort_by_key(|c| std::cmp::Reverse(c.number));
        state.details.insert(
            number,
            ChangeDetails {
                number,
                description: description.to_string(),
                files: files
                    .iter()
                    .map(|p| DescribedFile {
                        depot_path: p.to_string(),
                        size: 1,
                        digest: None,
                    })
                    .collect(),
            },
        );
    }

    /// Serve `bytes` when the engine downloads `depot_path`.
    pub fn set_download(&self, depot_path: &str, bytes: Vec<u8>) {
        self.lock().downloads.insert(depot_path.to_string(), bytes);
    }

    /// Depot paths synced (non-preview), in call order.
    pub fn synced_files(&self) -> Vec<String> {
        self.lock().synced.clone()
    }

    /// Depot paths force-synced, in call order.
    pub fn force_synced_files(&self) -> Vec<String> {
        self.lock().force_synced.clone()
    }

    pub fn resolved_files(&self) -> Vec<String> {
        self.lock().resolved.clone()
    }

    /// `(depot path, change)` pairs requested through `download`, in call
    /// order.
    pub fn downloaded_files(&self) -> Vec<(String, i64)> {
        self.lock().downloaded.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state lock")
    }
}

impl VcsClient for MockVcs {
    fn changes(&self, _filespec: &str, max: usize) -> Result<Vec<ChangeSummary>> {
        Ok(self.lock().changes.iter().take(max).cloned().collect())
    }

    fn opened(&self) -> Result<Vec<OpenedFile>> {
        Ok(self.lock().opened.clone())
    }

    fn sync(
        &self,
        files: &[String],
        _change: i64,
        flags: SyncFlags,
        on_file: &mut dyn FnMut(&str),
    ) -> Result<SyncSummary> {
        let mut state = self.lock();
        if flags.preview {
            return Ok(SyncSummary {
                synced: state.files_to_sync.clone(),
                clobbered: Vec::new(),
            });
        }
        let mut summary = SyncSummary::default();
        for file in files {
            if !flags.force && state.clobbered.contains(file) {
                summary.clobbered.push(file.clone());
            } else {
                on_file(file);
                state.synced.push(file.clone());
                summary.synced.push(file.clone());
            }
        }
        Ok(summary)
    }

    fn force_sync(&self, file: &str, _change: i64) -> Result<()> {
        let mut state = self.lock();
        state.clobbered.retain(|c| c != file);
        state.force_synced.push(file.to_string());
        Ok(())
    }

    fn unresolved(&self) -> Result<Vec<String>> {
        Ok(self.lock().unresolved.clone())
    }

    fn resolve(&self, file: &str) -> Result<()> {
        let mut state = self.lock();
        state.resolved.push(file.to_string());
        if state.auto_resolve_succeeds {
            state.unresolved.retain(|u| u != file);
        }
        Ok(())
    }

    fn describe(&self, change: i64) -> Result<ChangeDetails> {
        self.lock()
            .details
            .get(&change)
            .cloned()
            .ok_or_else(|| Error::operation("describe", change.to_string(), "no such change"))
    }

    fn download(&self, depot_path: &str, change: i64, dest: &Path) -> Result<()> {
        let mut state = self.lock();
        state.downloaded.push((depot_path.to_string(), change));
        let bytes = state
            .downloads
            .get(depot_path)
            .ok_or_else(|| Error::operation("print", depot_path, "no such file"))?;
        std::fs::write(dest, bytes)?;
        Ok(())
    }

    fn map_path(&self, path: &str) -> Result<PathMapping> {
        let (depot_path, local_path) = if let Some(rest) = path.strip_prefix(&self.depot_root) {
            (
                path.to_string(),
                format!("{}{}", self.local_root, rest),
            )
        } else if let Some(rest) = path.strip_prefix(&self.local_root) {
            (format!("{}{}", self.depot_root, rest), path.to_string())
        } else {
            return Err(Error::NotMapped {
                path: path.to_string(),
            });
        };
        Ok(PathMapping {
            client_path: depot_path.replace("//", "//client/"),
            depot_path,
            local_path,
        })
    }
}

/// Open actions convenience used by scenario setups.
pub fn opened(depot_path: &str, action: FileAction) -> OpenedFile {
    OpenedFile {
        depot_path: depot_path.to_string(),
        action,
    }
}
