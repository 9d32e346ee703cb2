//! Authoritative baseline store.
//!
//! A baseline is the last known-good `(file_id, mtime, size, checksum)` of a
//! file. At most one baseline exists per `(file_id, mtime_s, mtime_ns)`; a
//! file on a mutable root accumulates one baseline per modification time,
//! each kept alive by its `last_accessed` stamp until the TTL sweep drops it.
//!
//! # Architecture
//!
//! * [`BaselineStore`]: the storage seam. Shared by every verification
//!   worker, so implementations must be `Send + Sync`.
//! * [`sqlite`]: [`SqliteBaselineStore`], the store over a shared SQLite file.
//! * [`reconcile`]: the state machine deciding PASS / FAIL / SKIP and
//!   maintaining baselines.

pub mod reconcile;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scanner::ModifiedTime;

pub use reconcile::{ReconcileError, ReconcilePolicy, Reconciler};
pub use sqlite::SqliteBaselineStore;

/// Store-assigned identifier of a baseline.
pub type RecordId = i64;

/// A stored baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaselineRecord {
    /// Store-assigned unique identifier. Increases with insertion order.
    pub id: RecordId,
    /// SHA-256 of the file's identity path.
    pub file_id: String,
    /// Modification time, whole seconds.
    pub mtime_s: i64,
    /// Sub-second part of the modification time. `None` for rows written
    /// before the field existed; backfilled on the next exact match.
    pub mtime_ns: Option<u32>,
    /// File size in bytes.
    pub size: u64,
    /// CRC-32 of the contents.
    pub checksum: u32,
    /// Last time this exact baseline was matched.
    pub last_accessed: DateTime<Utc>,
}

impl BaselineRecord {
    /// Whether this row predates the nanosecond field.
    #[must_use]
    pub fn needs_nanos_backfill(&self) -> bool {
        self.mtime_ns.is_none()
    }

    /// Modification time, treating a missing nanosecond part as zero.
    #[must_use]
    pub fn modified(&self) -> ModifiedTime {
        ModifiedTime::new(self.mtime_s, self.mtime_ns.unwrap_or(0))
    }
}

/// A baseline about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineDraft {
    /// SHA-256 of the file's identity path.
    pub file_id: String,
    /// Modification time.
    pub modified: ModifiedTime,
    /// File size in bytes.
    pub size: u64,
    /// CRC-32 of the contents.
    pub checksum: u32,
}

/// Errors from a baseline store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The underlying SQLite operation failed.
    #[error("Baseline store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value cannot be represented.
    #[error("Baseline store row {id} has an invalid {field}: {value}")]
    InvalidValue {
        /// Row identifier
        id: RecordId,
        /// Column name
        field: &'static str,
        /// Raw stored value
        value: i64,
    },

    /// Another thread panicked while holding the connection.
    #[error("Baseline store connection lock poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage seam for baselines.
pub trait BaselineStore: Send + Sync {
    /// The baseline for exactly this file and modification time.
    ///
    /// A row without a nanosecond part matches on whole seconds alone.
    fn find_exact(&self, file_id: &str, modified: ModifiedTime)
        -> StoreResult<Option<BaselineRecord>>;

    /// The newest baseline (by modification time) for a file, if any.
    fn find_latest(&self, file_id: &str) -> StoreResult<Option<BaselineRecord>>;

    /// All baselines for a file, oldest insertion first.
    fn records_for(&self, file_id: &str) -> StoreResult<Vec<BaselineRecord>>;

    /// Set `last_accessed` on one baseline. Returns the number of rows matched.
    fn touch(&self, id: RecordId, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Fill in a missing nanosecond part. Returns the number of rows changed.
    fn backfill_nanos(&self, id: RecordId, mtime_ns: u32) -> StoreResult<u64>;

    /// Create the baseline, or refresh it if another writer created it first.
    fn upsert(&self, draft: &BaselineDraft, now: DateTime<Utc>) -> StoreResult<()>;

    /// Delete every baseline of a file. Returns the number deleted.
    fn delete_by_file_id(&self, file_id: &str) -> StoreResult<u64>;

    /// Delete baselines not accessed since `cutoff`. Returns the number deleted.
    fn expire_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    /// Total number of baselines.
    fn count(&self) -> StoreResult<u64>;
}
