//! Identity path construction.
//!
//! A file's identity must not depend on where its root happens to be mounted
//! on the current machine. [`relativize`] strips the configured root and
//! rebuilds the remainder in a canonical form:
//!
//! - every component is normalized to Unicode NFC (macOS hands out NFD names,
//!   Windows and Linux typically NFC),
//! - components are joined with [`IDENTITY_SEPARATOR`] on every platform,
//! - the result is prefixed with [`IDENTITY_SEPARATOR`].
//!
//! The backslash separator and leading separator match the historical
//! identity format, so existing baselines keep their file IDs.
//!
//! # Example
//!
//! ```
//! use rotcheck::scanner::path_utils::relativize;
//! use std::path::Path;
//!
//! let relative = relativize(Path::new("/mnt/media/dir1/file1.txt"), Path::new("/mnt/media")).unwrap();
//! assert_eq!(relative, "\\dir1\\file1.txt");
//! ```

use std::borrow::Cow;
use std::path::{Component, Path};

use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

use super::ScanError;

/// Separator used inside identity paths, regardless of platform.
pub const IDENTITY_SEPARATOR: char = '\\';

/// Strip `root` from `absolute_path` and return the canonical identity path.
///
/// The prefix check is component-wise, so `/data2/x` is not under `/data`.
///
/// # Errors
///
/// Returns [`ScanError::InvalidPath`] if `absolute_path` does not start with
/// `root`, or if the remainder contains anything but plain names.
pub fn relativize(absolute_path: &Path, root: &Path) -> Result<String, ScanError> {
    let invalid = || ScanError::InvalidPath {
        path: absolute_path.to_path_buf(),
        root: root.to_path_buf(),
    };

    let remainder = absolute_path.strip_prefix(root).map_err(|_| invalid())?;

    let mut identity = String::with_capacity(remainder.as_os_str().len() + 1);
    for component in remainder.components() {
        match component {
            Component::Normal(name) => {
                identity.push(IDENTITY_SEPARATOR);
                identity.push_str(&normalize_component(&name.to_string_lossy()));
            }
            _ => return Err(invalid()),
        }
    }

    if identity.is_empty() {
        identity.push(IDENTITY_SEPARATOR);
    }

    Ok(identity)
}

/// Normalize a single path component to NFC, borrowing when it already is.
#[must_use]
pub fn normalize_component(name: &str) -> Cow<'_, str> {
    match is_nfc_quick(name.chars()) {
        IsNormalized::Yes => Cow::Borrowed(name),
        _ => Cow::Owned(name.nfc().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_relativize_strips_root() {
        let relative = relativize(Path::new("/c/dir1/file1.txt"), Path::new("/c")).unwrap();
        assert_eq!(relative, "\\dir1\\file1.txt");
    }

    #[test]
    fn test_relativize_keeps_spaces() {
        let relative = relativize(
            Path::new("/n/dir 1/dir 2/file 1.txt"),
            Path::new("/n/dir 1"),
        )
        .unwrap();
        assert_eq!(relative, "\\dir 2\\file 1.txt");
    }

    #[test]
    fn test_relativize_root_with_trailing_separator() {
        let relative = relativize(Path::new("/c/dir1/file1.txt"), Path::new("/c/")).unwrap();
        assert_eq!(relative, "\\dir1\\file1.txt");
    }

    #[test]
    fn test_relativize_outside_root() {
        let err = relativize(Path::new("/c/dir1/file1.txt"), Path::new("/z")).unwrap_err();
        assert!(matches!(err, ScanError::InvalidPath { .. }));

        let err = relativize(Path::new("/c/dir1/file1.txt"), Path::new("/c/dir2")).unwrap_err();
        assert!(matches!(err, ScanError::InvalidPath { .. }));
    }

    #[test]
    fn test_relativize_is_component_wise() {
        let err = relativize(Path::new("/data2/file.txt"), Path::new("/data")).unwrap_err();
        assert!(matches!(err, ScanError::InvalidPath { .. }));
    }

    #[test]
    fn test_relativize_rejects_parent_components() {
        let err = relativize(Path::new("/data/../etc/passwd"), Path::new("/data")).unwrap_err();
        assert!(matches!(err, ScanError::InvalidPath { .. }));
    }

    #[test]
    fn test_relativize_independent_of_mount_point() {
        let a = relativize(
            &PathBuf::from("/mnt/a/photos/2020/img.jpg"),
            Path::new("/mnt/a"),
        )
        .unwrap();
        let b = relativize(
            &PathBuf::from("/Volumes/backup/photos/2020/img.jpg"),
            Path::new("/Volumes/backup"),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_component_nfd_to_nfc() {
        let nfd = "cafe\u{0301}.txt";
        assert_eq!(normalize_component(nfd), "café.txt");
        assert!(matches!(normalize_component("plain.txt"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_relativize_normalizes_unicode() {
        let nfc = relativize(Path::new("/r/café.txt"), Path::new("/r")).unwrap();
        let nfd = relativize(Path::new("/r/cafe\u{0301}.txt"), Path::new("/r")).unwrap();
        assert_eq!(nfc, nfd);
    }
}
