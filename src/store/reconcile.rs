//! Reconciliation of a file against its baselines.
//!
//! Given a file and the mutability of its root, [`Reconciler::reconcile`]
//! looks for a baseline in this order:
//!
//! 1. **Exact match** on `(file_id, mtime)`: refresh `last_accessed`,
//!    backfill a missing nanosecond part, then compare size and checksum.
//! 2. **Stale match** (same file, other mtime): on an immutable root this is
//!    itself a failure, so the newest baseline is compared and fails. On a
//!    mutable root, or for an exempt suffix, the file is treated as new.
//! 3. **No baseline**: a new immutable file younger than the too-new
//!    threshold is skipped. Anything else gets a new baseline and passes.
//!
//! Divergences are [`Outcome::Fail`](crate::verify::Outcome::Fail) verdicts.
//! Only broken invariants and storage failures are errors.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::{BaselineDraft, BaselineRecord, BaselineStore, RecordId, StoreError};
use crate::scanner::{FileRecord, HashError};
use crate::verify::{Mutability, Verdict};

/// Default suffixes exempt from the immutability check.
///
/// Parity files are regenerated when files are added to an archive.
pub const DEFAULT_EXEMPT_SUFFIXES: &[&str] = &[".par2"];

/// Default age below which a new immutable file is not baselined.
pub const DEFAULT_TOO_NEW_HOURS: i64 = 24;

/// Errors that stop reconciliation.
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    /// A baseline found by file id carries a different file id.
    #[error("Fatal error! File ID mismatch! Local File={local} but Database File={stored}")]
    FileIdMismatch {
        /// File id of the file on disk
        local: String,
        /// File id stored in the baseline
        stored: String,
    },

    /// Refreshing a baseline that was just found matched the wrong number of rows.
    #[error("Could not update last accessed time for {file_id} (baseline {id} matched {matched} rows)")]
    TouchMissed {
        /// Baseline identifier
        id: RecordId,
        /// File id of the baseline
        file_id: String,
        /// Number of rows the update matched
        matched: u64,
    },

    /// The baseline store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The file could not be read.
    #[error(transparent)]
    File(#[from] HashError),
}

impl ReconcileError {
    /// Whether the file disappeared between enumeration and reconciliation.
    #[must_use]
    pub fn is_vanished_file(&self) -> bool {
        matches!(self, ReconcileError::File(e) if e.is_not_found())
    }
}

/// Tunables of the reconciliation state machine.
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    /// New immutable files created more recently than this are skipped.
    pub too_new: Duration,
    /// Identity-path suffixes that may change on immutable roots.
    pub exempt_suffixes: Vec<String>,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            too_new: Duration::hours(DEFAULT_TOO_NEW_HOURS),
            exempt_suffixes: DEFAULT_EXEMPT_SUFFIXES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl ReconcilePolicy {
    /// Set the too-new threshold.
    #[must_use]
    pub fn with_too_new(mut self, too_new: Duration) -> Self {
        self.too_new = too_new;
        self
    }

    /// Set the exempt suffixes.
    #[must_use]
    pub fn with_exempt_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.exempt_suffixes = suffixes;
        self
    }

    fn is_exempt(&self, relative_path: &str) -> bool {
        self.exempt_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && relative_path.ends_with(suffix.as_str()))
    }
}

/// Baseline found for a file, and how it was found.
enum Lookup {
    Exact(BaselineRecord),
    ImmutableStale(BaselineRecord),
    Missing,
}

/// Decides the outcome of a file and maintains its baselines.
pub struct Reconciler {
    store: Arc<dyn BaselineStore>,
    policy: ReconcilePolicy,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &"<store>")
            .field("policy", &self.policy)
            .finish()
    }
}

impl Reconciler {
    /// Create a reconciler over `store` with the default policy.
    #[must_use]
    pub fn new(store: Arc<dyn BaselineStore>) -> Self {
        Self {
            store,
            policy: ReconcilePolicy::default(),
        }
    }

    /// Replace the policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn BaselineStore> {
        &self.store
    }

    /// Reconcile `record` against its baselines as of now.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::reconcile_at`].
    pub fn reconcile(
        &self,
        record: &FileRecord,
        mutability: Mutability,
    ) -> Result<Verdict, ReconcileError> {
        self.reconcile_at(record, mutability, Utc::now())
    }

    /// Reconcile `record` against its baselines as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] on a store failure, an unreadable file, or a
    /// broken store invariant. Divergences from the baseline are not errors.
    pub fn reconcile_at(
        &self,
        record: &FileRecord,
        mutability: Mutability,
        now: DateTime<Utc>,
    ) -> Result<Verdict, ReconcileError> {
        match self.lookup(record, mutability, now)? {
            Lookup::Exact(baseline) => self.compare(record, &baseline),
            Lookup::ImmutableStale(baseline) => {
                let verdict = self.compare(record, &baseline)?;
                Ok(Verdict {
                    message: format!(
                        "Immutable file was modified: {} ({})",
                        record.absolute_path().display(),
                        verdict.message
                    ),
                    ..verdict
                })
            }
            Lookup::Missing => self.create(record, mutability, now),
        }
    }

    fn lookup(
        &self,
        record: &FileRecord,
        mutability: Mutability,
        now: DateTime<Utc>,
    ) -> Result<Lookup, ReconcileError> {
        let file_id = record.file_id();

        if let Some(exact) = self.store.find_exact(file_id, record.modified()?)? {
            let matched = self.store.touch(exact.id, now)?;
            if matched != 1 {
                return Err(ReconcileError::TouchMissed {
                    id: exact.id,
                    file_id: exact.file_id,
                    matched,
                });
            }
            if exact.needs_nanos_backfill() {
                let nanos = record.modified()?.nanos;
                self.store.backfill_nanos(exact.id, nanos)?;
                log::debug!(
                    "Backfilled mtime_ns={} on baseline {} for {}",
                    nanos,
                    exact.id,
                    record.absolute_path().display()
                );
            }
            return Ok(Lookup::Exact(exact));
        }

        let Some(latest) = self.store.find_latest(file_id)? else {
            return Ok(Lookup::Missing);
        };

        let relative_path = record.identity().relative_path();
        if mutability.is_immutable() && !self.policy.is_exempt(relative_path) {
            log::warn!(
                "Immutable file has been modified: {}",
                record.absolute_path().display()
            );
            Ok(Lookup::ImmutableStale(latest))
        } else {
            log::debug!(
                "File has been seen before but has been modified: {}",
                record.absolute_path().display()
            );
            Ok(Lookup::Missing)
        }
    }

    fn compare(
        &self,
        record: &FileRecord,
        baseline: &BaselineRecord,
    ) -> Result<Verdict, ReconcileError> {
        if record.file_id() != baseline.file_id {
            return Err(ReconcileError::FileIdMismatch {
                local: record.file_id().to_string(),
                stored: baseline.file_id.clone(),
            });
        }

        let modified = record.modified()?;
        let mtime_matches = match baseline.mtime_ns {
            Some(_) => modified == baseline.modified(),
            None => modified.seconds == baseline.mtime_s,
        };
        if !mtime_matches {
            return Ok(Verdict::fail(format!(
                "File mtime mismatch! Local File={} but Database={}",
                modified,
                baseline.modified()
            )));
        }

        let size = record.size()?;
        if size != baseline.size {
            return Ok(Verdict::fail(format!(
                "File size mismatch! Local File={} but Database={}",
                size, baseline.size
            )));
        }

        let checksum = record.checksum()?;
        if checksum != baseline.checksum {
            return Ok(Verdict::fail(format!(
                "File CRC mismatch! Local File={} but Database={}",
                checksum, baseline.checksum
            )));
        }

        Ok(Verdict::pass(format!(
            "File {} passed verification",
            record.absolute_path().display()
        )))
    }

    fn create(
        &self,
        record: &FileRecord,
        mutability: Mutability,
        now: DateTime<Utc>,
    ) -> Result<Verdict, ReconcileError> {
        if mutability.is_immutable() && self.is_too_new(record, now)? {
            return Ok(Verdict::skip(format!(
                "Immutable file {} skipped because it was created recently",
                record.absolute_path().display()
            )));
        }

        let draft = BaselineDraft {
            file_id: record.file_id().to_string(),
            modified: record.modified()?,
            size: record.size()?,
            checksum: record.checksum()?,
        };
        self.store.upsert(&draft, now)?;

        Ok(Verdict::pass(format!(
            "New baseline saved for {} (mtime={}, size={}, crc={})",
            record.absolute_path().display(),
            draft.modified,
            draft.size,
            draft.checksum
        )))
    }

    fn is_too_new(&self, record: &FileRecord, now: DateTime<Utc>) -> Result<bool, HashError> {
        let created = DateTime::<Utc>::from(record.created()?);
        Ok(created > now - self.policy.too_new)
    }
}
