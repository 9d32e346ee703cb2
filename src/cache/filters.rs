//! Static path filters applied before any cache lookup.
//!
//! The absolute path is split on the platform separator and every segment is
//! tested, so a matching directory name anywhere above the file skips it.
//! The defaults target Syncthing staging folders (`.stfolder`, `.stversions`)
//! and temporary files.

use std::path::{Path, MAIN_SEPARATOR};

/// Default segment prefixes that cause a skip.
pub const DEFAULT_SKIP_PREFIXES: &[&str] = &[".st"];

/// Default segment suffixes that cause a skip.
pub const DEFAULT_SKIP_SUFFIXES: &[&str] = &[".tmp"];

/// Prefix / suffix rules over path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipFilter {
    prefixes: Vec<String>,
    suffixes: Vec<String>,
}

impl Default for SkipFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_SKIP_PREFIXES.iter().map(|s| (*s).to_string()).collect(),
            DEFAULT_SKIP_SUFFIXES.iter().map(|s| (*s).to_string()).collect(),
        )
    }
}

impl SkipFilter {
    /// Create a filter. Empty patterns are dropped, they would match everything.
    #[must_use]
    pub fn new(prefixes: Vec<String>, suffixes: Vec<String>) -> Self {
        Self {
            prefixes: prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
            suffixes: suffixes.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    /// A filter that never matches.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Whether any segment of `path` starts with a prefix or ends with a suffix.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        path.split(MAIN_SEPARATOR).any(|segment| {
            self.prefixes.iter().any(|p| segment.starts_with(p.as_str()))
                || self.suffixes.iter().any(|s| segment.ends_with(s.as_str()))
        })
    }
}
