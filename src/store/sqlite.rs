//! Baseline store over a shared SQLite database.
//!
//! The database file is the "connection string": it usually lives on shared
//! storage so every machine verifying a copy of the same tree reconciles
//! against the same baselines. Writers on other machines hold their own
//! connections, so creation goes through `INSERT … ON CONFLICT` on the unique
//! `(file_id, mtime_s, mtime_ns)` index and is safe to repeat.
//! SQLite treats NULLs as distinct in a unique index, so legacy rows with a
//! NULL `mtime_ns` are not covered by that guarantee.
//!
//! SQLite has no TTL index. [`BaselineStore::expire_older_than`] is the sweep
//! standing in for it and runs once at process start.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{BaselineDraft, BaselineRecord, BaselineStore, RecordId, StoreError, StoreResult};
use crate::scanner::ModifiedTime;

/// Name of the baseline table.
pub const TABLE_NAME: &str = "baselines";

/// Default lifetime of a baseline nobody has matched (366 days).
pub const DEFAULT_TTL_DAYS: i64 = 366;

const COLUMNS: &str = "id, file_id, mtime_s, mtime_ns, size, checksum, last_accessed";

/// SQLite implementation of [`BaselineStore`].
pub struct SqliteBaselineStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteBaselineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBaselineStore")
            .field("conn", &"<sqlite>")
            .finish()
    }
}

impl SqliteBaselineStore {
    /// Opens or creates the baseline database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(StdDuration::from_secs(30))?;
        let store = Self::from_connection(conn)?;
        log::info!(
            "Opened baseline store at {} ({} baselines)",
            path.display(),
            store.count()?
        );
        Ok(store)
    }

    /// Creates a throwaway store that lives in memory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the schema cannot be created.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id TEXT NOT NULL,
                mtime_s INTEGER NOT NULL,
                mtime_ns INTEGER,
                size INTEGER NOT NULL,
                checksum INTEGER NOT NULL,
                last_accessed TIMESTAMP NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_{TABLE_NAME}_identity
                ON {TABLE_NAME}(file_id, mtime_s, mtime_ns);
            CREATE INDEX IF NOT EXISTS idx_{TABLE_NAME}_last_accessed
                ON {TABLE_NAME}(last_accessed);"
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn query_one(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Option<BaselineRecord>> {
        let raw = self
            .conn()?
            .query_row(sql, params, RawRow::read)
            .optional()?;
        raw.map(RawRow::into_record).transpose()
    }
}

/// Column values as SQLite hands them out, before range checks.
struct RawRow {
    id: i64,
    file_id: String,
    mtime_s: i64,
    mtime_ns: Option<i64>,
    size: i64,
    checksum: i64,
    last_accessed: i64,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file_id: row.get(1)?,
            mtime_s: row.get(2)?,
            mtime_ns: row.get(3)?,
            size: row.get(4)?,
            checksum: row.get(5)?,
            last_accessed: row.get(6)?,
        })
    }

    fn into_record(self) -> StoreResult<BaselineRecord> {
        let id = self.id;
        let invalid = |field: &'static str, value: i64| StoreError::InvalidValue { id, field, value };

        let mtime_ns = self
            .mtime_ns
            .map(|ns| {
                u32::try_from(ns)
                    .ok()
                    .filter(|ns| *ns < 1_000_000_000)
                    .ok_or_else(|| invalid("mtime_ns", ns))
            })
            .transpose()?;
        let size = u64::try_from(self.size).map_err(|_| invalid("size", self.size))?;
        let checksum =
            u32::try_from(self.checksum).map_err(|_| invalid("checksum", self.checksum))?;
        let last_accessed = DateTime::from_timestamp_millis(self.last_accessed)
            .ok_or_else(|| invalid("last_accessed", self.last_accessed))?;

        Ok(BaselineRecord {
            id,
            file_id: self.file_id,
            mtime_s: self.mtime_s,
            mtime_ns,
            size,
            checksum,
            last_accessed,
        })
    }
}

impl BaselineStore for SqliteBaselineStore {
    fn find_exact(
        &self,
        file_id: &str,
        modified: ModifiedTime,
    ) -> StoreResult<Option<BaselineRecord>> {
        // Prefer a row with the exact nanoseconds over a legacy row without them
        self.query_one(
            &format!(
                "SELECT {COLUMNS} FROM {TABLE_NAME}
                 WHERE file_id = ?1 AND mtime_s = ?2 AND (mtime_ns = ?3 OR mtime_ns IS NULL)
                 ORDER BY mtime_ns IS NULL, id
                 LIMIT 1"
            ),
            params![file_id, modified.seconds, modified.nanos],
        )
    }

    fn find_latest(&self, file_id: &str) -> StoreResult<Option<BaselineRecord>> {
        self.query_one(
            &format!(
                "SELECT {COLUMNS} FROM {TABLE_NAME}
                 WHERE file_id = ?1
                 ORDER BY mtime_s DESC, COALESCE(mtime_ns, 0) DESC, id DESC
                 LIMIT 1"
            ),
            params![file_id],
        )
    }

    fn records_for(&self, file_id: &str) -> StoreResult<Vec<BaselineRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM {TABLE_NAME} WHERE file_id = ?1 ORDER BY id"
        ))?;
        let raws = stmt
            .query_map(params![file_id], RawRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawRow::into_record).collect()
    }

    fn touch(&self, id: RecordId, now: DateTime<Utc>) -> StoreResult<u64> {
        let matched = self.conn()?.execute(
            &format!("UPDATE {TABLE_NAME} SET last_accessed = ?1 WHERE id = ?2"),
            params![now.timestamp_millis(), id],
        )?;
        Ok(matched as u64)
    }

    fn backfill_nanos(&self, id: RecordId, mtime_ns: u32) -> StoreResult<u64> {
        let changed = self.conn()?.execute(
            &format!("UPDATE {TABLE_NAME} SET mtime_ns = ?1 WHERE id = ?2 AND mtime_ns IS NULL"),
            params![mtime_ns, id],
        )?;
        Ok(changed as u64)
    }

    fn upsert(&self, draft: &BaselineDraft, now: DateTime<Utc>) -> StoreResult<()> {
        let size = i64::try_from(draft.size).map_err(|_| StoreError::InvalidValue {
            id: 0,
            field: "size",
            value: i64::MAX,
        })?;
        self.conn()?.execute(
            &format!(
                "INSERT INTO {TABLE_NAME} (file_id, mtime_s, mtime_ns, size, checksum, last_accessed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(file_id, mtime_s, mtime_ns) DO UPDATE SET
                    size = excluded.size,
                    checksum = excluded.checksum,
                    last_accessed = excluded.last_accessed"
            ),
            params![
                draft.file_id,
                draft.modified.seconds,
                draft.modified.nanos,
                size,
                draft.checksum,
                now.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    fn delete_by_file_id(&self, file_id: &str) -> StoreResult<u64> {
        let deleted = self.conn()?.execute(
            &format!("DELETE FROM {TABLE_NAME} WHERE file_id = ?1"),
            params![file_id],
        )?;
        Ok(deleted as u64)
    }

    fn expire_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let deleted = self.conn()?.execute(
            &format!("DELETE FROM {TABLE_NAME} WHERE last_accessed < ?1"),
            params![cutoff.timestamp_millis()],
        )?;
        if deleted > 0 {
            log::info!("Expired {} baselines not accessed since {}", deleted, cutoff);
        }
        Ok(deleted as u64)
    }

    fn count(&self) -> StoreResult<u64> {
        let count: i64 = self.conn()?.query_row(
            &format!("SELECT COUNT(*) FROM {TABLE_NAME}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
