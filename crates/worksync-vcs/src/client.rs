//! Version-control client trait
//!
//! The engine consumes the server through this trait only; the concrete
//! transport (command-line client, native API) lives behind it. Every
//! operation is blocking and returns a structured result; a failure is
//! fatal for the engine phase that issued it, with no internal retries.

use std::path::Path;

use crate::Result;
use crate::types::{
    ChangeDetails, ChangeSummary, OpenedFile, PathMapping, SyncFlags, SyncSummary,
};

/// Blocking operations against the version-control server.
pub trait VcsClient: Send + Sync {
    /// Enumerate submitted changes matching `filespec` (which may carry an
    /// `@range` suffix), newest first, up to `max` entries.
    fn changes(&self, filespec: &str, max: usize) -> Result<Vec<ChangeSummary>>;

    /// Enumerate files the user currently has open in this workspace.
    fn opened(&self) -> Result<Vec<OpenedFile>>;

    /// Sync `files` to `change`. `on_file` is invoked per transferred file
    /// for progress reporting. Files blocked by a writable local copy are
    /// collected in the summary rather than failing the operation.
    fn sync(
        &self,
        files: &[String],
        change: i64,
        flags: SyncFlags,
        on_file: &mut dyn FnMut(&str),
    ) -> Result<SyncSummary>;

    /// Force-sync a single file to `change`, overwriting a writable local
    /// copy.
    fn force_sync(&self, file: &str, change: i64) -> Result<()>;

    /// Enumerate files with pending resolves.
    fn unresolved(&self) -> Result<Vec<String>>;

    /// Attempt an automatic resolve of one file.
    fn resolve(&self, file: &str) -> Result<()>;

    /// Describe one change: metadata plus per-file size and digest.
    fn describe(&self, change: i64) -> Result<ChangeDetails>;

    /// Fetch the contents of `depot_path` as of `change` into a local file.
    fn download(&self, depot_path: &str, change: i64, dest: &Path) -> Result<()>;

    /// Map a path (depot, client, or local syntax) to its full triple.
    fn map_path(&self, path: &str) -> Result<PathMapping>;
}
