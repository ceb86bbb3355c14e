//! Error types for resource locating.

use thiserror::Error;

/// Errors that can occur while turning input text into a resource descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// Input was empty or whitespace only.
    #[error("empty input: expected a share URL or file/folder id")]
    Empty,

    /// Fuzzy extraction found no known share-link shape in the URL.
    #[error("could not extract a file or folder id from '{url}'\n  Suggestion: {suggestion}")]
    Unresolvable {
        /// The URL that matched no known shape.
        url: String,
        /// How to fix the issue.
        suggestion: &'static str,
    },
}

impl LocatorError {
    /// Creates an `Unresolvable` error for a URL matching no share-link shape.
    #[must_use]
    pub fn unresolvable(url: &str) -> Self {
        Self::Unresolvable {
            url: url.to_string(),
            suggestion: "Pass the bare id with --id, or copy the link from the Share dialog",
        }
    }
}
