//! Recency cache row definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One verified file, keyed by its absolute path on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyEntry {
    /// Absolute path of the file (primary key).
    pub absolute_path: PathBuf,
    /// Modification time in whole seconds observed at the last verification.
    pub modified_time_s: i64,
    /// When the file last passed verification.
    pub last_verified: DateTime<Utc>,
}

impl RecencyEntry {
    /// Whether the entry still describes a file with the given modification time.
    #[must_use]
    pub fn matches_mtime(&self, modified_time_s: i64) -> bool {
        self.modified_time_s == modified_time_s
    }

    /// Whether the last verification happened after `cutoff`.
    #[must_use]
    pub fn verified_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_verified > cutoff
    }
}
