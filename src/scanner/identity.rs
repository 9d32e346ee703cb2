//! File identity and metadata snapshot.
//!
//! A file under verification is modelled in two layers:
//!
//! - [`FileIdentity`] is immutable and never touches the disk: the absolute
//!   path (disk I/O, recency cache key), the identity path (root stripped,
//!   canonical form) and the file ID derived from it.
//! - [`FileRecord`] wraps an identity with the disk-derived fields. Each one
//!   is read at most once and memoized for the record's lifetime. The
//!   orchestrator uses [`FileRecord::preload`] so the stat happens on the
//!   enumeration thread instead of interleaving with other workers.
//!
//! Fields are never refreshed. If the file changes after it was read, the
//! record keeps describing the old state.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::checksum::{compute_checksum, compute_file_id};
use super::path_utils::relativize;
use super::{HashError, ScanError};

/// Modification time split into whole seconds and a sub-second remainder.
///
/// `nanos` is always in `0..1_000_000_000`, also for pre-epoch times, so the
/// pair orders the same way the original instant does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ModifiedTime {
    /// Seconds since the Unix epoch (negative before 1970).
    pub seconds: i64,
    /// Nanoseconds past `seconds`.
    pub nanos: u32,
}

impl ModifiedTime {
    /// Create a modification time from its parts.
    #[must_use]
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Split a [`SystemTime`] into seconds and nanoseconds.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self {
                seconds: after.as_secs() as i64,
                nanos: after.subsec_nanos(),
            },
            Err(e) => {
                let before = e.duration();
                let mut seconds = -(before.as_secs() as i64);
                let mut nanos = before.subsec_nanos();
                if nanos > 0 {
                    seconds -= 1;
                    nanos = 1_000_000_000 - nanos;
                }
                Self { seconds, nanos }
            }
        }
    }

    /// Convert back to a UTC timestamp, if representable.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

impl std::fmt::Display for ModifiedTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// How much of a [`FileRecord`] to read up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreloadMode {
    /// Stat the file (timestamps and size); read contents on demand.
    #[default]
    Metadata,
    /// Stat the file and compute its checksum immediately.
    Full,
}

/// Disk metadata captured by a single stat call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Last modification time.
    pub modified: ModifiedTime,
    /// Creation (birth) time, or the modification time where unsupported.
    pub created: SystemTime,
    /// File size in bytes.
    pub size: u64,
}

impl FileStat {
    /// Read metadata for `path`, following symlinks.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be stat'ed.
    pub fn read(path: &Path) -> Result<Self, HashError> {
        let metadata = std::fs::metadata(path).map_err(|e| HashError::from_io(path, e))?;
        Self::from_metadata(path, &metadata)
    }

    fn from_metadata(path: &Path, metadata: &Metadata) -> Result<Self, HashError> {
        let modified = metadata
            .modified()
            .map_err(|e| HashError::from_io(path, e))?;
        let created = metadata.created().unwrap_or_else(|e| {
            log::trace!(
                "No creation time for {} ({}), using modification time",
                path.display(),
                e
            );
            modified
        });

        Ok(Self {
            modified: ModifiedTime::from_system_time(modified),
            created,
            size: metadata.len(),
        })
    }
}

/// Location-independent identity of a file under a configured root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    absolute_path: PathBuf,
    relative_path: String,
    file_id: String,
}

impl FileIdentity {
    /// Build the identity of `absolute_path` under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPath`] if the path is not under `root`.
    pub fn new(absolute_path: &Path, root: &Path) -> Result<Self, ScanError> {
        let relative_path = relativize(absolute_path, root)?;
        Ok(Self::from_parts(absolute_path.to_path_buf(), relative_path))
    }

    /// Build an identity from an already-relativized identity path.
    #[must_use]
    pub fn from_parts(absolute_path: PathBuf, relative_path: String) -> Self {
        let file_id = compute_file_id(&relative_path);
        Self {
            absolute_path,
            relative_path,
            file_id,
        }
    }

    /// Path on this machine. Used for disk I/O and as the recency cache key.
    #[must_use]
    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    /// Canonical path relative to the root. Identical on every machine.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// SHA-256 of the relative path, lower-case hex.
    #[must_use]
    pub fn file_id(&self) -> &str {
        &self.file_id
    }
}

/// A file identity plus its memoized disk-derived fields.
#[derive(Debug)]
pub struct FileRecord {
    identity: FileIdentity,
    stat: OnceLock<FileStat>,
    checksum: OnceLock<u32>,
}

impl FileRecord {
    /// Wrap an identity without touching the disk.
    #[must_use]
    pub fn new(identity: FileIdentity) -> Self {
        Self {
            identity,
            stat: OnceLock::new(),
            checksum: OnceLock::new(),
        }
    }

    /// Wrap an identity and read the disk fields selected by `mode` now.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be stat'ed or read.
    pub fn preload(identity: FileIdentity, mode: PreloadMode) -> Result<Self, HashError> {
        let record = Self::new(identity);
        record.stat()?;
        if mode == PreloadMode::Full {
            record.checksum()?;
        }
        Ok(record)
    }

    /// The file's identity.
    #[must_use]
    pub fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    /// Shorthand for the identity's absolute path.
    #[must_use]
    pub fn absolute_path(&self) -> &Path {
        self.identity.absolute_path()
    }

    /// Shorthand for the identity's file ID.
    #[must_use]
    pub fn file_id(&self) -> &str {
        self.identity.file_id()
    }

    /// Disk metadata, stat'ed on first access.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the first stat fails.
    pub fn stat(&self) -> Result<&FileStat, HashError> {
        if let Some(stat) = self.stat.get() {
            return Ok(stat);
        }
        let stat = FileStat::read(self.absolute_path())?;
        Ok(self.stat.get_or_init(|| stat))
    }

    /// Modification time.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the first stat fails.
    pub fn modified(&self) -> Result<ModifiedTime, HashError> {
        Ok(self.stat()?.modified)
    }

    /// Creation time.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the first stat fails.
    pub fn created(&self) -> Result<SystemTime, HashError> {
        Ok(self.stat()?.created)
    }

    /// Size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the first stat fails.
    pub fn size(&self) -> Result<u64, HashError> {
        Ok(self.stat()?.size)
    }

    /// CRC-32 of the contents, read on first access.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the first read fails.
    pub fn checksum(&self) -> Result<u32, HashError> {
        if let Some(checksum) = self.checksum.get() {
            return Ok(*checksum);
        }
        let checksum = compute_checksum(self.absolute_path())?;
        Ok(*self.checksum.get_or_init(|| checksum))
    }
}
