//! Binary archive manifest format
//!
//! A manifest records every file a previous archive extraction wrote, so the
//! files can be removed later without touching anything the user has since
//! modified. Layout: 4-byte signature, 4-byte format version, 4-byte entry
//! count, then per entry a length-prefixed UTF-8 relative path, a `u64` byte
//! length and an `i64` timestamp in 100 ns ticks since the Unix epoch. All
//! integers are little-endian.

use chrono::{DateTime, TimeZone, Utc};
use worksync_fs::{WorkspacePath, write_atomic};

use crate::{Error, Result};

/// Leading magic bytes of every manifest file.
pub const MANIFEST_SIGNATURE: [u8; 4] = *b"WSAM";

/// Current manifest format version. Bumped when entry metadata changes
/// (for example if content hashes replace the length/mtime heuristic).
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// One extracted file: relative path, byte length, UTC last-write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path relative to the workspace root, forward slashes
    pub path: String,
    /// File length in bytes at extraction time
    pub length: u64,
    /// Last-write time stamped onto the file at extraction
    pub modified: DateTime<Utc>,
}

/// Ordered list of files written by one archive extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveManifest {
    pub entries: Vec<ManifestEntry>,
}

impl ArchiveManifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Serialize to the binary wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.entries.len() * 32);
        out.extend_from_slice(&MANIFEST_SIGNATURE);
        out.extend_from_slice(&MANIFEST_FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            let path = entry.path.as_bytes();
            out.extend_from_slice(&(path.len() as u32).to_le_bytes());
            out.extend_from_slice(path);
            out.extend_from_slice(&entry.length.to_le_bytes());
            out.extend_from_slice(&ticks_from_time(entry.modified).to_le_bytes());
        }
        out
    }

    /// Parse from the binary wire format.
    ///
    /// # Errors
    ///
    /// A wrong signature or format version is a hard failure, as is any
    /// truncation or a non-UTF-8 path.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { data, pos: 0 };

        let signature = cursor.take::<4>()?;
        if signature != MANIFEST_SIGNATURE {
            return Err(Error::BadSignature { found: signature });
        }
        let version = u32::from_le_bytes(cursor.take::<4>()?);
        if version != MANIFEST_FORMAT_VERSION {
            return Err(Error::UnsupportedVersion { found: version });
        }

        let count = u32::from_le_bytes(cursor.take::<4>()?) as usize;
        let mut entries = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let path_len = u32::from_le_bytes(cursor.take::<4>()?) as usize;
            let path_bytes = cursor.take_slice(path_len)?;
            let path = std::str::from_utf8(path_bytes)
                .map_err(|_| Error::PathNotUtf8)?
                .to_string();
            let length = u64::from_le_bytes(cursor.take::<8>()?);
            let ticks = i64::from_le_bytes(cursor.take::<8>()?);
            entries.push(ManifestEntry {
                path,
                length,
                modified: time_from_ticks(ticks),
            });
        }
        Ok(Self { entries })
    }

    /// Load a manifest file from disk.
    pub fn load(path: &WorkspacePath) -> Result<Self> {
        let native = path.to_native();
        let data = std::fs::read(&native).map_err(|e| Error::io(&native, e))?;
        Self::from_bytes(&data)
    }

    /// Write the manifest to disk atomically (temp file + rename).
    pub fn save(&self, path: &WorkspacePath) -> Result<()> {
        write_atomic(path, &self.to_bytes())?;
        Ok(())
    }
}

/// Convert a UTC time to 100 ns ticks since the Unix epoch.
pub fn ticks_from_time(time: DateTime<Utc>) -> i64 {
    time.timestamp() * 10_000_000 + i64::from(time.timestamp_subsec_nanos()) / 100
}

/// Convert 100 ns ticks since the Unix epoch back to a UTC time.
pub fn time_from_ticks(ticks: i64) -> DateTime<Utc> {
    let secs = ticks.div_euclid(10_000_000);
    let nanos = (ticks.rem_euclid(10_000_000) * 100) as u32;
    Utc.timestamp_opt(secs, nanos).single().unwrap_or_default()
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(Error::Truncated);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}
