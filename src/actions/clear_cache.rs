//! Single-row recency cache eviction.

use std::path::Path;

use super::ActionError;
use crate::cache::RecencyCache;

/// Remove `absolute_path` from the recency cache.
///
/// The path must be given exactly as it was verified. Returns whether a row
/// was removed.
///
/// # Errors
///
/// Returns [`ActionError::Cache`] if the cache cannot be updated.
pub fn clear_cache(cache: &RecencyCache, absolute_path: &Path) -> Result<bool, ActionError> {
    log::info!(
        "Attempting to remove file from verification database: {}",
        absolute_path.display()
    );
    let removed = cache.remove(absolute_path)? > 0;
    if removed {
        log::info!(
            "Successfully removed file from verification database: {}",
            absolute_path.display()
        );
    } else {
        log::info!(
            "File not found in verification database: {}",
            absolute_path.display()
        );
    }
    Ok(removed)
}
