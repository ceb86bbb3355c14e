//! Streaming MD5 digests and verification.
//!
//! Files are hashed in fixed-size blocks so arbitrarily large downloads can be
//! verified without loading them into memory. These functions are blocking;
//! async callers should run them on `tokio::task::spawn_blocking`.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use thiserror::Error;
use tracing::{debug, instrument};

/// Default block size for digest reads (64 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 65_536;

/// Length of a hex-encoded MD5 digest.
pub const MD5_HEX_LEN: usize = 32;

/// Errors from checksum computation and verification.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// The expected digest is not 32 hexadecimal characters.
    #[error("expected MD5 must be {MD5_HEX_LEN} hexadecimal characters: '{expected}'")]
    InvalidExpected {
        /// The rejected value as supplied by the caller.
        expected: String,
    },

    /// The file's digest differs from the expected one.
    #[error("MD5 mismatch for {path}:\n  Actual: {actual}\n  Expected: {expected}")]
    Mismatch {
        /// File that was hashed.
        path: PathBuf,
        /// Digest computed from the file contents.
        actual: String,
        /// Digest the caller expected.
        expected: String,
    },

    /// Reading the file failed.
    #[error("IO error hashing {path}: {source}")]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ChecksumError {
    /// Creates an IO error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Checks that `expected` is exactly 32 hexadecimal characters.
///
/// Performs no I/O, so callers can fail fast before touching the network or disk.
///
/// # Errors
///
/// Returns [`ChecksumError::InvalidExpected`] for any other shape.
pub fn validate_expected_md5(expected: &str) -> Result<(), ChecksumError> {
    if expected.len() == MD5_HEX_LEN && expected.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ChecksumError::InvalidExpected {
            expected: expected.to_string(),
        })
    }
}

/// Computes the lowercase hex MD5 digest of a file, reading `block_size` bytes at a time.
///
/// A `block_size` of zero falls back to [`DEFAULT_BLOCK_SIZE`].
///
/// # Errors
///
/// Returns [`ChecksumError::Io`] if the file cannot be opened or read.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn md5_digest(path: &Path, block_size: usize) -> Result<String, ChecksumError> {
    let block_size = if block_size == 0 {
        DEFAULT_BLOCK_SIZE
    } else {
        block_size
    };
    let mut file = File::open(path).map_err(|e| ChecksumError::io(path, e))?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0_u8; block_size];

    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ChecksumError::io(path, e)),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verifies that a file's MD5 digest equals `expected` (case-insensitive).
///
/// The expected value is validated before the file is opened.
///
/// # Errors
///
/// - [`ChecksumError::InvalidExpected`] if `expected` is malformed
/// - [`ChecksumError::Mismatch`] carrying both digests when they differ
/// - [`ChecksumError::Io`] if the file cannot be read
#[instrument(skip_all, fields(path = %path.display()))]
pub fn verify_md5(path: &Path, expected: &str) -> Result<(), ChecksumError> {
    validate_expected_md5(expected)?;

    debug!("calculating MD5");
    let actual = md5_digest(path, DEFAULT_BLOCK_SIZE)?;
    if actual.eq_ignore_ascii_case(expected) {
        debug!(md5 = %actual, "MD5 matches");
        return Ok(());
    }

    Err(ChecksumError::Mismatch {
        path: path.to_path_buf(),
        actual,
        expected: expected.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // md5("hello world")
    const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    fn write_temp(content: &[u8]) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_md5_digest_known_value() {
        let (_dir, path) = write_temp(b"hello world");
        assert_eq!(md5_digest(&path, DEFAULT_BLOCK_SIZE).unwrap(), HELLO_MD5);
    }

    #[test]
    fn test_md5_digest_independent_of_block_size() {
        let content: Vec<u8> = (0..200_000_u32).map(|i| (i % 251) as u8).collect();
        let (_dir, path) = write_temp(&content);
        let small = md5_digest(&path, 7).unwrap();
        let large = md5_digest(&path, DEFAULT_BLOCK_SIZE).unwrap();
        let zero = md5_digest(&path, 0).unwrap();
        assert_eq!(small, large);
        assert_eq!(zero, large);
    }

    #[test]
    fn test_md5_digest_empty_file() {
        let (_dir, path) = write_temp(b"");
        assert_eq!(
            md5_digest(&path, DEFAULT_BLOCK_SIZE).unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_verify_md5_accepts_true_digest() {
        let (_dir, path) = write_temp(b"hello world");
        assert!(verify_md5(&path, HELLO_MD5).is_ok());
        assert!(verify_md5(&path, &HELLO_MD5.to_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_md5_mismatch_reports_both_digests() {
        let (_dir, path) = write_temp(b"hello world");
        let wrong = "00000000000000000000000000000000";
        match verify_md5(&path, wrong) {
            Err(ChecksumError::Mismatch {
                actual, expected, ..
            }) => {
                assert_eq!(actual, HELLO_MD5);
                assert_eq!(expected, wrong);
            }
            other => panic!("expected Mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_md5_rejects_short_value_before_io() {
        // The path does not exist: a malformed checksum must be reported
        // instead of an IO error.
        let missing = Path::new("/definitely/not/here.bin");
        match verify_md5(missing, "abc") {
            Err(ChecksumError::InvalidExpected { expected }) => assert_eq!(expected, "abc"),
            other => panic!("expected InvalidExpected, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_expected_md5_rejects_non_hex() {
        assert!(validate_expected_md5("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").is_err());
        assert!(validate_expected_md5(HELLO_MD5).is_ok());
    }

    #[test]
    fn test_md5_digest_missing_file_is_io_error() {
        let err = md5_digest(Path::new("/definitely/not/here.bin"), 0).unwrap_err();
        assert!(matches!(err, ChecksumError::Io { .. }));
    }
}
