//! Scanner module for file identity, checksums and directory enumeration.
//!
//! This module provides functionality for:
//! - Sequential directory walking using walkdir
//! - CRC-32 content checksums, serialized process-wide
//! - Machine-independent file identities (SHA-256 of the relative path)
//! - Unicode path normalization
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and regular-file discovery
//! - [`checksum`]: CRC-32 streaming and file ID digests
//! - [`identity`]: [`FileIdentity`] and the [`FileRecord`] metadata snapshot
//! - [`path_utils`]: Root stripping and identity path normalization
//!
//! # Example
//!
//! ```no_run
//! use rotcheck::scanner::{FileIdentity, FileRecord, PreloadMode, Walker};
//! use std::path::Path;
//!
//! let root = Path::new("/srv/archive");
//! for entry in Walker::new(root).walk() {
//!     let path = entry.unwrap();
//!     let identity = FileIdentity::new(&path, root).unwrap();
//!     let record = FileRecord::preload(identity, PreloadMode::Metadata).unwrap();
//!     println!("{} -> {}", record.identity().relative_path(), record.identity().file_id());
//! }
//! ```

pub mod checksum;
pub mod identity;
pub mod path_utils;
pub mod walker;

use std::path::PathBuf;

// Re-export main types
pub use checksum::{compute_checksum, compute_checksum_reader, compute_file_id, BUFFER_SIZE};
pub use identity::{FileIdentity, FileRecord, FileStat, ModifiedTime, PreloadMode};
pub use path_utils::relativize;
pub use walker::Walker;

/// Errors that can occur during directory scanning and identity building.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A file path does not live under the configured root.
    #[error("Absolute path {path} does not start with {root}")]
    InvalidPath {
        /// Path that was being relativized
        path: PathBuf,
        /// Root it was expected to live under
        root: PathBuf,
    },

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while reading a file's metadata or contents.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for the given path.
    pub(crate) fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Whether the file disappeared between enumeration and reading.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::NotFound(PathBuf::from("/missing"));
        assert_eq!(err.to_string(), "Path not found: /missing");

        let err = ScanError::NotADirectory(PathBuf::from("/file.txt"));
        assert_eq!(err.to_string(), "Not a directory: /file.txt");

        let err = ScanError::InvalidPath {
            path: PathBuf::from("/data2/file.txt"),
            root: PathBuf::from("/data"),
        };
        assert_eq!(
            err.to_string(),
            "Absolute path /data2/file.txt does not start with /data"
        );
    }

    #[test]
    fn test_hash_error_classification() {
        let path = std::path::Path::new("/test");
        let err = HashError::from_io(path, std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "File not found: /test");

        let err = HashError::from_io(
            path,
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.to_string(), "Permission denied: /test");

        let err = HashError::from_io(path, std::io::Error::other("disk on fire"));
        assert!(!err.is_not_found());
    }
}
