//! Manifest-based archive reconciliation for Worksync
//!
//! Precompiled-binary archives are extracted through a binary manifest that
//! records every file written. The manifest makes later removal safe:
//! files the user has modified since extraction are detected by length and
//! timestamp and left untouched.

pub mod error;
pub mod manifest;
pub mod reconcile;

pub use error::{Error, Result};
pub use manifest::{
    ArchiveManifest, MANIFEST_FORMAT_VERSION, MANIFEST_SIGNATURE, ManifestEntry,
};
pub use reconcile::{
    MODIFIED_TOLERANCE_MS, RemovalReport, extract_archive, remove_archive_files,
};
