//! Maintenance actions.
//!
//! Small one-shot tools operating on the same databases as a verification
//! run:
//!
//! - [`clear_cache`]: drop one file from the recency cache so the next run
//!   verifies it regardless of the skip window
//! - [`fix_timestamp`]: write a file's baseline modification time back onto
//!   the file, after a copy or restore reset it
//! - [`delete_records`]: bulk-delete baselines by file ID
//!
//! ```no_run
//! use rotcheck::actions::clear_cache;
//! use rotcheck::cache::RecencyCache;
//! use std::path::Path;
//!
//! let cache = RecencyCache::open(Path::new("file_verification.sqlite")).unwrap();
//! let removed = clear_cache(&cache, Path::new("/srv/photos/img_0001.jpg")).unwrap();
//! ```

pub mod clear_cache;
pub mod delete_records;
pub mod fix_timestamp;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::scanner::{HashError, ScanError};
use crate::store::StoreError;

pub use clear_cache::clear_cache;
pub use delete_records::{delete_records, delete_records_from_file, DeletionSummary};
pub use fix_timestamp::{fix_timestamp, TimestampFix};

/// Error type for maintenance actions.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The recency cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The baseline store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The file is not under the given root.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The file could not be stat'ed.
    #[error(transparent)]
    File(#[from] HashError),

    /// No baseline exists for the file.
    #[error("no baseline found for {path} (file ID {file_id})")]
    NoBaseline {
        /// File on disk
        path: PathBuf,
        /// Its file ID
        file_id: String,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}
