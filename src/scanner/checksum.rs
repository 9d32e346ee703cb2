//! CRC-32 content checksums and SHA-256 file identifiers.
//!
//! # Overview
//!
//! Content checksums stream the file through a [`crc32fast::Hasher`] in
//! [`BUFFER_SIZE`] chunks. Many verification workers may ask for checksums at
//! the same time, but the read loop itself is serialized process-wide so a
//! spinning disk only ever services one sequential read.
//!
//! File identifiers are the lower-case hex SHA-256 of the identity path (see
//! [`crate::scanner::path_utils::identity_path`]).

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use super::HashError;

/// Read buffer size for checksum streaming (8KB).
pub const BUFFER_SIZE: usize = 8 * 1024;

/// Serializes every checksum read loop in the process.
static DISK_LOCK: Mutex<()> = Mutex::new(());

/// Compute the CRC-32 checksum of a file's contents.
///
/// Only one checksum read runs at a time across all threads.
///
/// # Errors
///
/// Returns [`HashError`] if the file cannot be opened or read.
pub fn compute_checksum(path: &Path) -> Result<u32, HashError> {
    // A poisoned lock only means another reader panicked; the guard protects no data.
    let _guard = DISK_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
    let checksum = compute_checksum_reader(file).map_err(|e| HashError::from_io(path, e))?;
    log::trace!("Checksum {} for {}", checksum, path.display());
    Ok(checksum)
}

/// Compute the CRC-32 checksum of everything a reader yields.
///
/// # Errors
///
/// Propagates any read error other than [`ErrorKind::Interrupted`].
pub fn compute_checksum_reader<R: Read>(mut reader: R) -> std::io::Result<u32> {
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(hasher.finalize())
}

/// Compute the file ID for an identity path: lower-case hex SHA-256 of its UTF-8 bytes.
#[must_use]
pub fn compute_file_id(identity_path: &str) -> String {
    let digest = Sha256::digest(identity_path.as_bytes());
    format!("{:x}", digest)
}
