//! Error types for the download module.
//!
//! Timeouts, missing files, permission failures, and quota pages all map to
//! [`DownloadError::Resolution`]: the caller only needs to know the resource
//! could not be turned into bytes. Network and proxy failures stay separate as
//! [`DownloadError::Transport`] so the boundary can suggest checking them.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving and streaming a resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The resource could not be resolved to a byte stream.
    #[error("cannot retrieve '{id}': {reason}\n  Suggestion: {suggestion}")]
    Resolution {
        /// The identifier the caller asked for.
        id: String,
        /// Why no byte stream was obtained.
        reason: String,
        /// How to fix the issue.
        suggestion: &'static str,
    },

    /// Network-level error (DNS, connection refused, TLS, proxy).
    #[error("network error fetching {url}: {source}\n  Suggestion: {suggestion}")]
    Transport {
        /// The URL being fetched.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
        /// How to fix the issue.
        suggestion: &'static str,
    },

    /// The HTTP client could not be configured (bad proxy URL, TLS backend).
    #[error("failed to configure HTTP client: {source}\n  Suggestion: Check the proxy URL format")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// File system error while writing the download.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A configured endpoint or source URL is not a valid URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

const SHARE_SUGGESTION: &str =
    "Make sure the file is shared with 'Anyone with the link' and the id is correct";
const QUOTA_SUGGESTION: &str =
    "The file was fetched too often recently; wait and retry, or make a copy in your own Drive";
const GENERIC_SUGGESTION: &str = "Check the link and try again later";
const PAGE_SUGGESTION: &str =
    "If this is a share link, enable fuzzy id extraction (--fuzzy) or pass the id with --id";

impl DownloadError {
    /// Creates a resolution error with the default suggestion.
    pub fn resolution(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            id: id.into(),
            reason: reason.into(),
            suggestion: GENERIC_SUGGESTION,
        }
    }

    /// Creates a resolution error for a missing or inaccessible resource.
    pub fn not_shared(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            id: id.into(),
            reason: reason.into(),
            suggestion: SHARE_SUGGESTION,
        }
    }

    /// Creates a resolution error for a quota/throttling refusal.
    pub fn throttled(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            id: id.into(),
            reason: reason.into(),
            suggestion: QUOTA_SUGGESTION,
        }
    }

    /// Creates a resolution error for an HTML page that is neither file content
    /// nor a recognizable warning page.
    pub fn unexpected_page(id: impl Into<String>) -> Self {
        Self::Resolution {
            id: id.into(),
            reason: "received an HTML page instead of file content".to_string(),
            suggestion: PAGE_SUGGESTION,
        }
    }

    /// Creates a resolution error for a timed-out request.
    pub fn timeout(id: impl Into<String>) -> Self {
        Self::resolution(id, "request timed out")
    }

    /// Creates a transport error; the suggestion depends on whether a proxy was in use.
    pub fn transport(url: impl Into<String>, source: reqwest::Error, via_proxy: bool) -> Self {
        let suggestion = if via_proxy {
            "Failed to use proxy; check your proxy settings"
        } else {
            "Check your network connection"
        };
        Self::Transport {
            url: url.into(),
            source,
            suggestion,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns true for errors meaning the resource itself could not be resolved.
    #[must_use]
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs context
// (id, url, path) that the source errors do not carry.
