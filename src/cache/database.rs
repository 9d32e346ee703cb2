//! SQLite-backed recency cache.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::entry::RecencyEntry;
use super::filters::SkipFilter;
use crate::scanner::{FileRecord, HashError};

/// Name of the single cache table.
pub const TABLE_NAME: &str = "file_verification";

/// Default file name of the cache database.
pub const DEFAULT_FILE_NAME: &str = "file_verification.sqlite";

/// Errors from the recency cache. All of them are fatal to a run.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The underlying SQLite operation failed.
    #[error("Recency cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The file's metadata could not be read for the lookup.
    #[error("Recency cache could not read file metadata: {0}")]
    File(#[from] HashError),

    /// A stored timestamp is outside the representable range.
    #[error("Recency cache holds an invalid timestamp {millis} for {path}")]
    InvalidTimestamp {
        /// Row key
        path: String,
        /// Raw stored value
        millis: i64,
    },

    /// Another thread panicked while holding the connection.
    #[error("Recency cache connection lock poisoned")]
    Poisoned,
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Time windows governing skips and cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// A file verified more recently than this, with an unchanged mtime, is skipped.
    pub skip_window: Duration,
    /// Rows not verified for longer than this are deleted by [`RecencyCache::cleanup`].
    pub retention: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            skip_window: Duration::days(90),
            retention: Duration::days(365),
        }
    }
}

/// Local record of recent successful verifications, keyed by absolute path.
///
/// The connection is shared by all verification workers and guarded by a
/// mutex; every statement is short.
pub struct RecencyCache {
    conn: Mutex<Connection>,
    filter: SkipFilter,
    policy: CachePolicy,
}

impl std::fmt::Debug for RecencyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecencyCache")
            .field("conn", &"<sqlite>")
            .field("filter", &self.filter)
            .field("policy", &self.policy)
            .finish()
    }
}

impl RecencyCache {
    /// Opens or creates the cache database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Database`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| HashError::from_io(parent, e))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(StdDuration::from_secs(10))?;
        let cache = Self::from_connection(conn)?;
        log::info!(
            "{} existing rows in the recency cache at {}",
            cache.row_count()?,
            path.display()
        );
        Ok(cache)
    }

    /// Creates a throwaway cache that lives in memory.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Database`] if the schema cannot be created.
    pub fn open_in_memory() -> CacheResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                absolute_file_path TEXT PRIMARY KEY,
                modified_time_s INTEGER NOT NULL,
                last_verified TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{TABLE_NAME}_last_verified
                ON {TABLE_NAME}(last_verified);"
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
            filter: SkipFilter::default(),
            policy: CachePolicy::default(),
        })
    }

    /// Replace the static path filter.
    #[must_use]
    pub fn with_filter(mut self, filter: SkipFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the skip and retention windows.
    #[must_use]
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn conn(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Number of rows currently stored.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn row_count(&self) -> CacheResult<u64> {
        let count: i64 = self.conn()?.query_row(
            &format!("SELECT COUNT(*) FROM {TABLE_NAME}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Whether `record` can be skipped this run.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure or if the file cannot be stat'ed.
    pub fn should_skip(&self, record: &FileRecord) -> CacheResult<bool> {
        self.should_skip_at(record, Utc::now())
    }

    /// [`should_skip`](Self::should_skip) evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure or if the file cannot be stat'ed.
    pub fn should_skip_at(&self, record: &FileRecord, now: DateTime<Utc>) -> CacheResult<bool> {
        let path = record.absolute_path();
        if self.filter.matches(path) {
            log::debug!("Path filter matched {}", path.display());
            return Ok(true);
        }

        let Some(entry) = self.get(path)? else {
            return Ok(false);
        };

        let modified_time_s = record.modified()?.seconds;
        if !entry.matches_mtime(modified_time_s) {
            log::info!(
                "File {} has been modified since its last verification so will be checked",
                path.display()
            );
            return Ok(false);
        }

        Ok(entry.verified_since(now - self.policy.skip_window))
    }

    /// Remember that `record` passed verification just now.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure or if the file cannot be stat'ed.
    pub fn record_verification(&self, record: &FileRecord) -> CacheResult<()> {
        self.record_verification_at(record, Utc::now())
    }

    /// [`record_verification`](Self::record_verification) stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure or if the file cannot be stat'ed.
    pub fn record_verification_at(
        &self,
        record: &FileRecord,
        now: DateTime<Utc>,
    ) -> CacheResult<()> {
        let modified_time_s = record.modified()?.seconds;
        self.conn()?.execute(
            &format!(
                "INSERT INTO {TABLE_NAME} (absolute_file_path, modified_time_s, last_verified)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(absolute_file_path) DO UPDATE SET
                    modified_time_s = excluded.modified_time_s,
                    last_verified = excluded.last_verified"
            ),
            params![
                path_key(record.absolute_path()),
                modified_time_s,
                now.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    /// Delete rows not verified within the retention window.
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn cleanup(&self) -> CacheResult<usize> {
        self.cleanup_at(Utc::now())
    }

    /// [`cleanup`](Self::cleanup) evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn cleanup_at(&self, now: DateTime<Utc>) -> CacheResult<usize> {
        let cutoff = now - self.policy.retention;
        let deleted = self.conn()?.execute(
            &format!("DELETE FROM {TABLE_NAME} WHERE last_verified < ?1"),
            params![cutoff.timestamp_millis()],
        )?;
        log::info!("Cleaned up {} old rows from the recency cache", deleted);
        Ok(deleted)
    }

    /// Look up the row for an absolute path.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn get(&self, absolute_path: &Path) -> CacheResult<Option<RecencyEntry>> {
        let key = path_key(absolute_path);
        let row: Option<(i64, i64)> = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT modified_time_s, last_verified FROM {TABLE_NAME}
                     WHERE absolute_file_path = ?1"
                ),
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(modified_time_s, millis)| {
            let last_verified = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| CacheError::InvalidTimestamp {
                    path: key.clone(),
                    millis,
                })?;
            Ok(RecencyEntry {
                absolute_path: absolute_path.to_path_buf(),
                modified_time_s,
                last_verified,
            })
        })
        .transpose()
    }

    /// Remove the row for an absolute path, forcing a re-check next run.
    ///
    /// Returns the number of rows removed (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn remove(&self, absolute_path: &Path) -> CacheResult<usize> {
        let removed = self.conn()?.execute(
            &format!("DELETE FROM {TABLE_NAME} WHERE absolute_file_path = ?1"),
            params![path_key(absolute_path)],
        )?;
        Ok(removed)
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
