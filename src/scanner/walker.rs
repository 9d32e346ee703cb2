//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for enumerating the regular
//! files under a verification root. Enumeration is deliberately sequential:
//! the walker only discovers files, the verification work is dispatched to a
//! worker pool by the orchestrator.
//!
//! # Filtering
//!
//! - Directories are descended into but never yielded
//! - Symbolic links are not followed and not yielded
//! - Other non-regular entries (sockets, FIFOs, devices) are dropped
//! - Unreadable entries are logged at debug level and dropped
//!
//! Only a missing or non-directory root is reported as an error.
//!
//! # Example
//!
//! ```no_run
//! use rotcheck::scanner::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/srv/archive"));
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use super::ScanError;

/// Sequential walker yielding the regular files under a root.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given root.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding absolute paths of regular files.
    ///
    /// Entries are yielded in file-name order within each directory. The
    /// only error ever yielded is a root that is missing or not a directory,
    /// and it ends the iteration.
    pub fn walk(&self) -> Box<dyn Iterator<Item = Result<PathBuf, ScanError>> + '_> {
        if let Err(e) = self.check_root() {
            return Box::new(std::iter::once(Err(e)));
        }

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();

        Box::new(
            walk_dir
                .into_iter()
                .take_while(move |_| {
                    if self.is_shutdown_requested() {
                        log::debug!("Walker: Shutdown requested, stopping iteration");
                        false
                    } else {
                        true
                    }
                })
                .filter_map(move |entry_result| match entry_result {
                    Ok(entry) => {
                        if entry.file_type().is_file() {
                            Some(Ok(entry.into_path()))
                        } else {
                            if entry.file_type().is_symlink() {
                                log::trace!("Skipping symlink: {}", entry.path().display());
                            }
                            None
                        }
                    }
                    Err(e) => {
                        let path = e
                            .path()
                            .map_or_else(|| self.root.clone(), Path::to_path_buf);
                        log::debug!("Skipping unreadable entry {}: {}", path.display(), e);
                        None
                    }
                }),
        )
    }

    fn check_root(&self) -> Result<(), ScanError> {
        match std::fs::metadata(&self.root) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(ScanError::NotADirectory(self.root.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ScanError::NotFound(self.root.clone()))
            }
            Err(e) => Err(ScanError::Io {
                path: self.root.clone(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "c").unwrap();
        fs::write(dir.path().join("sub/deeper/d.txt"), "").unwrap();
        dir
    }

    fn walk_names(walker: &Walker, root: &Path) -> Vec<String> {
        walker
            .walk()
            .map(|r| {
                r.unwrap()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_walker_finds_regular_files_in_order() {
        let dir = create_test_dir();
        let walker = Walker::new(dir.path());

        assert_eq!(
            walk_names(&walker, dir.path()),
            vec!["a.txt", "b.txt", "sub/c.txt", "sub/deeper/d.txt"]
        );
    }

    #[test]
    fn test_walker_includes_empty_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("empty"), "").unwrap();
        let walker = Walker::new(dir.path());
        assert_eq!(walker.walk().count(), 1);
    }

    #[test]
    fn test_walker_empty_dir() {
        let dir = TempDir::new().unwrap();
        let walker = Walker::new(dir.path());
        assert_eq!(walker.walk().count(), 0);
    }

    #[test]
    fn test_walker_shutdown_flag() {
        let dir = create_test_dir();
        let flag = Arc::new(AtomicBool::new(true));
        let walker = Walker::new(dir.path()).with_shutdown_flag(flag);
        assert_eq!(walker.walk().count(), 0);
    }

    #[test]
    fn test_walker_handles_nonexistent_path() {
        let walker = Walker::new(Path::new("/nonexistent/path/for/rotcheck"));
        let results: Vec<_> = walker.walk().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ScanError::NotFound(_))));
    }

    #[test]
    fn test_walker_rejects_file_root() {
        let dir = create_test_dir();
        let walker = Walker::new(&dir.path().join("a.txt"));
        let results: Vec<_> = walker.walk().collect();
        assert!(matches!(results[0], Err(ScanError::NotADirectory(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_walker_skips_symlinks() {
        let dir = create_test_dir();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("linkdir")).unwrap();

        let walker = Walker::new(dir.path());
        assert_eq!(
            walk_names(&walker, dir.path()),
            vec!["a.txt", "b.txt", "sub/c.txt", "sub/deeper/d.txt"]
        );
    }
}
