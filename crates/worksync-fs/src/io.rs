//! Atomic and idempotent I/O operations

use std::fs::{self, OpenOptions};
use std::io::Write;

use fs2::FileExt;

use crate::{Error, Result, WorkspacePath};

/// Write content atomically to a file.
///
/// Uses a write-to-temp-then-rename strategy so a crash can never leave a
/// partially written file in place. The temp file lives in the same
/// directory as the target to guarantee the rename stays on one filesystem,
/// and an advisory lock guards against concurrent writers.
pub fn write_atomic(path: &WorkspacePath, content: &[u8]) -> Result<()> {
    let native = path.to_native();

    if let Some(parent) = native.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        native
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = native.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|_| Error::LockFailed {
            path: native.clone(),
        })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .sync_all()
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: native.clone(),
    })?;

    fs::rename(&temp_path, &native).map_err(|e| Error::io(&native, e))?;
    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &WorkspacePath) -> Result<String> {
    let native = path.to_native();
    fs::read_to_string(&native).map_err(|e| Error::io(&native, e))
}

/// Write text to a file only if the content differs from what is on disk.
///
/// Returns `true` when the file was written, `false` when the existing
/// content already matched and the write was skipped. This keeps repeated
/// runs from touching timestamps on files other tools watch.
pub fn write_text_if_changed(path: &WorkspacePath, content: &str) -> Result<bool> {
    if path.is_file() {
        match read_text(path) {
            Ok(existing) if existing == content => {
                tracing::debug!(path = %path, "Content unchanged, skipping write");
                return Ok(false);
            }
            _ => {}
        }
    }
    write_atomic(path, content.as_bytes())?;
    Ok(true)
}
