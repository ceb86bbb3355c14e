//! Error types for the local download cache.

use std::path::PathBuf;

use thiserror::Error;

use crate::checksum::ChecksumError;
use crate::download::DownloadError;
use crate::locator::LocatorError;

/// Errors that can occur during a cached download.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The expected checksum was rejected or the published file failed verification.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    /// The URL could not be turned into a resource descriptor.
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// The download itself failed; the temporary directory was removed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// A cache file or directory operation failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being operated on.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The cache lock could not be taken.
    #[error("failed to lock {path}: {source}\n  Suggestion: Check that the cache directory is writable")]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The caller's postprocess hook failed.
    #[error("postprocess failed for {path}: {source}")]
    Postprocess {
        /// Published file the hook ran on.
        path: PathBuf,
        /// Error returned by the hook.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CacheError {
    /// Creates an IO error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for a checksum mismatch, as opposed to other failures.
    #[must_use]
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, Self::Checksum(ChecksumError::Mismatch { .. }))
    }
}
