//! Archive extraction and manifest-guarded removal
//!
//! Extraction writes the manifest to disk *before* any payload file, so an
//! interrupted run can never leave payload files on disk that no manifest
//! claims. Removal deletes a file only while its length and timestamp still
//! match the manifest, which protects files the user has edited since the
//! archive was extracted.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use filetime::FileTime;
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use worksync_fs::WorkspacePath;

use crate::manifest::{ArchiveManifest, ManifestEntry, ticks_from_time, time_from_ticks};
use crate::{Error, Result};

/// Allowed drift between a manifest timestamp and the on-disk mtime, in
/// milliseconds.
///
/// Filesystems with coarse timestamp resolution (FAT, some network mounts)
/// round the stamped time, so an exact comparison would refuse to delete
/// files the extraction itself wrote.
pub const MODIFIED_TOLERANCE_MS: i64 = 2_000;

/// Outcome of a manifest-guarded removal pass.
#[derive(Debug, Default)]
pub struct RemovalReport {
    /// Relative paths deleted because they still matched the manifest
    pub deleted: Vec<String>,
    /// Relative paths left in place because they no longer matched
    pub skipped: Vec<String>,
}

/// Extract a gzip-compressed tar archive into `dest_root`.
///
/// The stale manifest (if any) is deleted first, the new manifest is written
/// atomically before any payload, and every payload file is stamped with the
/// single extraction timestamp recorded in the manifest. `progress` receives
/// the completed fraction after each file.
pub fn extract_archive(
    archive_path: &Path,
    dest_root: &WorkspacePath,
    manifest_path: &WorkspacePath,
    progress: &mut dyn FnMut(f32),
) -> Result<ArchiveManifest> {
    // A crash between manifest write and payload extraction must never leave
    // a manifest that overclaims, so drop the old one before anything else.
    if manifest_path.is_file() {
        std::fs::remove_file(manifest_path.to_native())
            .map_err(|e| Error::io(manifest_path.to_native(), e))?;
    }

    // One timestamp for the whole extraction, truncated to manifest tick
    // precision so the stamped mtimes compare equal on reload.
    let stamp = time_from_ticks(ticks_from_time(Utc::now()));

    // First pass: list payload files and build the manifest.
    let mut entries = Vec::new();
    for entry in open_archive(archive_path)?
        .entries()
        .map_err(|e| Error::io(archive_path, e))?
    {
        let entry = entry.map_err(|e| Error::io(archive_path, e))?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let path = entry_relative_path(&entry)?;
        entries.push(ManifestEntry {
            path,
            length: entry.size(),
            modified: stamp,
        });
    }

    let manifest = ArchiveManifest::new(entries);
    manifest.save(manifest_path)?;
    tracing::debug!(
        manifest = %manifest_path,
        files = manifest.entries.len(),
        "Wrote archive manifest"
    );

    // Second pass: extract payload, stamping each file with the shared time.
    std::fs::create_dir_all(dest_root.to_native())
        .map_err(|e| Error::io(dest_root.to_native(), e))?;
    let total = manifest.entries.len().max(1) as f32;
    let mut done = 0usize;
    for entry in open_archive(archive_path)?
        .entries()
        .map_err(|e| Error::io(archive_path, e))?
    {
        let mut entry = entry.map_err(|e| Error::io(archive_path, e))?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let relative = entry_relative_path(&entry)?;
        entry
            .unpack_in(dest_root.to_native())
            .map_err(|e| Error::io(dest_root.to_native(), e))?;

        let full = dest_root.join(&relative);
        let mtime = FileTime::from_unix_time(stamp.timestamp(), stamp.timestamp_subsec_nanos());
        filetime::set_file_mtime(full.to_native(), mtime)
            .map_err(|e| Error::io(full.to_native(), e))?;

        done += 1;
        progress(done as f32 / total);
    }

    Ok(manifest)
}

/// Remove the files a previous extraction wrote, guarded by the manifest.
///
/// A file is deleted only when its on-disk length matches the manifest
/// exactly and its mtime is within [`MODIFIED_TOLERANCE_MS`]; anything else
/// is skipped and logged so user edits survive. The manifest file itself is
/// removed once the pass completes.
pub fn remove_archive_files(
    manifest_path: &WorkspacePath,
    dest_root: &WorkspacePath,
) -> Result<RemovalReport> {
    let manifest = ArchiveManifest::load(manifest_path)?;
    let mut report = RemovalReport::default();

    for entry in &manifest.entries {
        let full = dest_root.join(&entry.path);
        match std::fs::metadata(full.to_native()) {
            Ok(meta) if file_matches_entry(&meta, entry) => {
                std::fs::remove_file(full.to_native())
                    .map_err(|e| Error::io(full.to_native(), e))?;
                report.deleted.push(entry.path.clone());
            }
            Ok(_) => {
                tracing::warn!(path = %full, "File modified since extraction, leaving in place");
                report.skipped.push(entry.path.clone());
            }
            Err(_) => {
                // Already gone; nothing to protect or delete
                report.skipped.push(entry.path.clone());
            }
        }
    }

    std::fs::remove_file(manifest_path.to_native())
        .map_err(|e| Error::io(manifest_path.to_native(), e))?;
    Ok(report)
}

fn file_matches_entry(meta: &std::fs::Metadata, entry: &ManifestEntry) -> bool {
    if meta.len() != entry.length {
        return false;
    }
    let Ok(modified) = meta.modified() else {
        return false;
    };
    let on_disk: DateTime<Utc> = modified.into();
    (on_disk - entry.modified).num_milliseconds().abs() <= MODIFIED_TOLERANCE_MS
}

fn open_archive(path: &Path) -> Result<Archive<GzDecoder<File>>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

fn entry_relative_path<R: std::io::Read>(entry: &tar::Entry<'_, R>) -> Result<String> {
    let raw = entry.path().map_err(|_| Error::PathNotUtf8)?;
    sanitize_relative_path(&raw.to_string_lossy())
}

/// Normalize an archive entry path and reject anything that could land
/// outside the destination root.
fn sanitize_relative_path(raw: &str) -> Result<String> {
    let text = raw.replace('\\', "/");
    let trimmed = text.trim_start_matches("./").trim_start_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|part| part == "..") {
        return Err(Error::UnsafeEntryPath { path: text });
    }
    Ok(trimmed.to_string())
}
