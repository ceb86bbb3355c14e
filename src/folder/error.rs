//! Error types for folder enumeration and retrieval.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that can occur while walking or downloading a folder.
#[derive(Debug, Error)]
pub enum FolderError {
    /// The folder holds more entries than the enumeration cap allows.
    #[error(
        "folder has more than {cap} entries (discovered {discovered}); only up to {cap} are retrieved without an override\n  Suggestion: Use --remaining-ok to download anyway"
    )]
    Capacity {
        /// Entries discovered when the walk stopped.
        discovered: usize,
        /// Configured cap.
        cap: usize,
    },

    /// The descriptor does not point at a folder.
    #[error(
        "'{id}' is not a folder\n  Suggestion: Check that the link points at a folder shared with \"Anyone with the link\", or download it without --folder"
    )]
    NotAFolder {
        /// The identifier that was walked.
        id: String,
    },

    /// Folder metadata or a listing page could not be fetched.
    #[error("failed to list folder contents: {0}")]
    Listing(#[from] DownloadError),

    /// A child file failed to download under the abort policy.
    #[error("failed to download {path}: {source}")]
    Download {
        /// Destination of the failed child.
        path: PathBuf,
        /// The underlying download error.
        #[source]
        source: DownloadError,
    },

    /// A destination directory could not be created.
    #[error("IO error creating {path}: {source}")]
    Io {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FolderError {
    /// Creates a capacity error.
    #[must_use]
    pub fn capacity(discovered: usize, cap: usize) -> Self {
        Self::Capacity { discovered, cap }
    }

    /// Returns `(discovered, cap)` for capacity errors.
    #[must_use]
    pub fn capacity_counts(&self) -> Option<(usize, usize)> {
        match self {
            Self::Capacity { discovered, cap } => Some((*discovered, *cap)),
            _ => None,
        }
    }
}
