//! Restore a file's modification time from its baseline.
//!
//! Copying or restoring a tree often resets modification times. On an
//! immutable root that turns every file into a FAIL even though the contents
//! are intact. Writing the stored mtime back makes the file match its
//! baseline again, after which a verification confirms the contents.

use std::path::{Path, PathBuf};

use filetime::FileTime;
use serde::Serialize;

use super::ActionError;
use crate::scanner::{FileIdentity, FileStat, ModifiedTime};
use crate::store::BaselineStore;

/// A modification time written back onto a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampFix {
    /// File that was updated
    pub path: PathBuf,
    /// Modification time before the fix
    pub previous: ModifiedTime,
    /// Modification time taken from the baseline
    pub restored: ModifiedTime,
}

impl TimestampFix {
    /// Whether the file already had the baseline's modification time.
    #[must_use]
    pub fn was_unchanged(&self) -> bool {
        self.previous == self.restored
    }
}

/// Set the modification time of `file` to the one in its baseline.
///
/// An exact baseline wins; otherwise the newest baseline of the file is
/// used. The store is only read.
///
/// # Errors
///
/// Returns [`ActionError::Scan`] if `file` is not under `root`,
/// [`ActionError::NoBaseline`] if the file has no baseline, or
/// [`ActionError::Io`] if the time cannot be written.
pub fn fix_timestamp(
    store: &dyn BaselineStore,
    file: &Path,
    root: &Path,
) -> Result<TimestampFix, ActionError> {
    let identity = FileIdentity::new(file, root)?;
    let previous = FileStat::read(file)?.modified;
    log::debug!(
        "{} has identity {} ({})",
        file.display(),
        identity.relative_path(),
        identity.file_id()
    );

    let baseline = match store.find_exact(identity.file_id(), previous)? {
        Some(exact) => exact,
        None => store
            .find_latest(identity.file_id())?
            .ok_or_else(|| ActionError::NoBaseline {
                path: file.to_path_buf(),
                file_id: identity.file_id().to_string(),
            })?,
    };

    // A legacy baseline without nanoseconds restores whole seconds
    let restored = baseline.modified();
    filetime::set_file_mtime(
        file,
        FileTime::from_unix_time(restored.seconds, restored.nanos),
    )
    .map_err(|source| ActionError::Io {
        path: file.to_path_buf(),
        source,
    })?;

    log::info!(
        "Fixed timestamp of {} to {} (was {})",
        file.display(),
        restored,
        previous
    );
    Ok(TimestampFix {
        path: file.to_path_buf(),
        previous,
        restored,
    })
}
