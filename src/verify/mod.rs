//! Verification results and the orchestrator producing them.
//!
//! # Overview
//!
//! Every processed file ends in exactly one [`Outcome`]. Outcomes are tallied
//! into a [`Histogram`] per root, and the per-root histograms accumulate into
//! the run totals reported at the end of a run.
//!
//! The [`VerificationOrchestrator`] walks a root, dispatches one unit of work
//! per file to a worker pool, and folds the outcomes back together.

pub mod orchestrator;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::cache::CacheError;
use crate::scanner::{HashError, ScanError};
use crate::store::ReconcileError;

pub use orchestrator::{OrchestratorConfig, VerificationOrchestrator};

/// Result of verifying a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// The file matches its baseline, or a new baseline was recorded.
    Pass,
    /// The file diverges from its baseline.
    Fail,
    /// The file was not verified this run.
    Skip,
}

impl Outcome {
    /// All outcomes, in reporting order.
    pub const ALL: [Outcome; 3] = [Outcome::Pass, Outcome::Fail, Outcome::Skip];
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::Skip => "SKIP",
        };
        f.write_str(label)
    }
}

/// Outcome of a file together with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Classification
    pub outcome: Outcome,
    /// Explanation, e.g. which field diverged
    pub message: String,
}

impl Verdict {
    /// A passing verdict.
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Pass,
            message: message.into(),
        }
    }

    /// A failing verdict.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail,
            message: message.into(),
        }
    }

    /// A skipped verdict.
    pub fn skip(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Skip,
            message: message.into(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.outcome, self.message)
    }
}

/// Whether the files under a root are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutability {
    /// Changes are expected and produce new baselines.
    Mutable,
    /// Archival data. Any change is reported as a failure.
    Immutable,
}

impl Mutability {
    /// Whether this is [`Mutability::Immutable`].
    #[must_use]
    pub fn is_immutable(self) -> bool {
        self == Mutability::Immutable
    }
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutability::Mutable => f.write_str("mutable"),
            Mutability::Immutable => f.write_str("immutable"),
        }
    }
}

/// Count of files per [`Outcome`].
///
/// Outcomes that never occurred are absent, so an empty histogram means no
/// file was processed at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    counts: BTreeMap<Outcome, usize>,
}

impl Histogram {
    /// Create an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one file.
    pub fn record(&mut self, outcome: Outcome) {
        *self.counts.entry(outcome).or_insert(0) += 1;
    }

    /// Add every count of `other` into this histogram.
    pub fn merge(&mut self, other: &Histogram) {
        for (outcome, count) in &other.counts {
            *self.counts.entry(*outcome).or_insert(0) += count;
        }
    }

    /// Count for one outcome, zero if absent.
    #[must_use]
    pub fn get(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    /// Whether no file has been counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of files counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Iterate over the outcomes that occurred.
    pub fn iter(&self) -> impl Iterator<Item = (Outcome, usize)> + '_ {
        self.counts.iter().map(|(o, c)| (*o, *c))
    }
}

impl FromIterator<Outcome> for Histogram {
    fn from_iter<I: IntoIterator<Item = Outcome>>(iter: I) -> Self {
        let mut histogram = Self::new();
        for outcome in iter {
            histogram.record(outcome);
        }
        histogram
    }
}

impl Serialize for Histogram {
    /// Serializes as `{"PASS": n, "FAIL": n, "SKIP": n}`, zeros included.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(Outcome::ALL.len()))?;
        for outcome in Outcome::ALL {
            map.serialize_entry(&outcome, &self.get(outcome))?;
        }
        map.end()
    }
}

/// Errors that abort a verification run.
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// The root could not be enumerated.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The recency cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Reconciliation hit a store failure or an invariant violation.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// A file could not be read.
    #[error(transparent)]
    File(#[from] HashError),

    /// The worker pool could not be built.
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// A shutdown was requested before the run completed.
    #[error("Verification interrupted")]
    Interrupted,
}

impl VerifyError {
    /// Whether the error only means a file disappeared mid-run.
    ///
    /// Such errors concern a single file and do not abort the run.
    #[must_use]
    pub fn is_vanished_file(&self) -> bool {
        match self {
            VerifyError::File(e) => e.is_not_found(),
            VerifyError::Cache(CacheError::File(e)) => e.is_not_found(),
            VerifyError::Reconcile(e) => e.is_vanished_file(),
            _ => false,
        }
    }
}
