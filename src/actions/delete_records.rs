//! Bulk baseline deletion by file ID.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;

use super::ActionError;
use crate::store::BaselineStore;

/// Outcome of a bulk deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeletionSummary {
    /// Non-blank IDs read
    pub processed: usize,
    /// IDs that had at least one baseline
    pub deleted: usize,
    /// IDs without any baseline
    pub not_found: usize,
    /// Baselines removed in total
    pub baselines_removed: u64,
}

impl std::fmt::Display for DeletionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Deletion Summary ===")?;
        writeln!(f, "Total IDs processed: {}", self.processed)?;
        writeln!(f, "Successfully deleted: {}", self.deleted)?;
        writeln!(f, "Not found in database: {}", self.not_found)?;
        write!(f, "Baselines removed: {}", self.baselines_removed)
    }
}

/// Delete every baseline of each file ID read from `reader`, one ID per line.
///
/// IDs are trimmed and blank lines are ignored.
///
/// # Errors
///
/// Returns [`ActionError::Store`] on the first store failure, or
/// [`ActionError::Io`] if the input cannot be read.
pub fn delete_records<R: BufRead>(
    store: &dyn BaselineStore,
    reader: R,
) -> Result<DeletionSummary, ActionError> {
    let mut summary = DeletionSummary::default();

    for line in reader.lines() {
        let line = line.map_err(|source| ActionError::Io {
            path: "<ids>".into(),
            source,
        })?;
        let file_id = line.trim();
        if file_id.is_empty() {
            continue;
        }

        summary.processed += 1;
        let removed = store.delete_by_file_id(file_id)?;
        log::debug!("Deleted {} baselines with file_id {}", removed, file_id);
        if removed > 0 {
            summary.deleted += 1;
            summary.baselines_removed += removed;
        } else {
            summary.not_found += 1;
        }
    }

    Ok(summary)
}

/// [`delete_records`] over the file at `path`.
///
/// # Errors
///
/// Returns [`ActionError::Io`] if the file cannot be opened or read, or
/// [`ActionError::Store`] on a store failure.
pub fn delete_records_from_file(
    store: &dyn BaselineStore,
    path: &Path,
) -> Result<DeletionSummary, ActionError> {
    let file = File::open(path).map_err(|source| ActionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    delete_records(store, BufReader::new(file)).map_err(|e| match e {
        ActionError::Io { source, .. } => ActionError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}
