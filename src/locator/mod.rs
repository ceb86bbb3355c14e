//! Parsing of share links and bare identifiers into resource descriptors.
//!
//! Everything here is pure: no network I/O, and the same input always yields
//! the same descriptor.
//!
//! # Example
//!
//! ```
//! use drivedl_core::locator::{parse_resource, ResourceKind};
//!
//! let descriptor = parse_resource(
//!     "https://drive.google.com/file/d/1A2B3C/view?usp=sharing",
//!     false,
//!     true,
//! )
//! .unwrap();
//! assert_eq!(descriptor.id, "1A2B3C");
//! assert_eq!(descriptor.kind, ResourceKind::File);
//! ```

mod error;

pub use error::LocatorError;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};
use url::Url;

/// Hosts that serve Drive share links.
const DRIVE_HOSTS: [&str; 3] = [
    "drive.google.com",
    "docs.google.com",
    "drive.usercontent.google.com",
];

/// What a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A single file.
    File,
    /// A folder whose children can be walked.
    Folder,
    /// Not yet known; settled by the first response.
    Unknown,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::File => "file",
            Self::Folder => "folder",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Canonical identification of a remote file or folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// File, folder, or not yet known.
    pub kind: ResourceKind,
    /// Service identifier. Never empty.
    pub id: String,
    /// Direct URL to fetch instead of the service download endpoint.
    pub source_url: Option<String>,
    /// Export format hint for native documents (e.g. `docx`, `xlsx`).
    pub export_format: Option<String>,
}

impl ResourceDescriptor {
    /// Creates a descriptor for a service id.
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            source_url: None,
            export_format: None,
        }
    }

    /// Creates a descriptor for a URL fetched as-is.
    #[must_use]
    pub fn direct(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            kind: ResourceKind::File,
            id: url.clone(),
            source_url: Some(url),
            export_format: None,
        }
    }

    /// Attaches an export format hint.
    #[must_use]
    pub fn with_export_format(mut self, format: Option<String>) -> Self {
        self.export_format = format.filter(|f| !f.trim().is_empty());
        self
    }
}

struct SharePattern {
    regex: Regex,
    kind: ResourceKind,
}

#[allow(clippy::expect_used)]
fn share_pattern(pattern: &str, kind: ResourceKind) -> SharePattern {
    SharePattern {
        regex: Regex::new(pattern).expect("share-link regex is valid"), // Static pattern, safe to panic
        kind,
    }
}

/// Share-link shapes in priority order; the first match wins.
static SHARE_PATTERNS: LazyLock<Vec<SharePattern>> = LazyLock::new(|| {
    vec![
        share_pattern(r"/file/d/([A-Za-z0-9_-]+)", ResourceKind::File),
        share_pattern(r"/open\?(?:[^#]*&)?id=([A-Za-z0-9_-]+)", ResourceKind::Unknown),
        share_pattern(r"/uc\?(?:[^#]*&)?id=([A-Za-z0-9_-]+)", ResourceKind::File),
        share_pattern(r"/folders/([A-Za-z0-9_-]+)", ResourceKind::Folder),
    ]
});

/// Parses caller input into a [`ResourceDescriptor`].
///
/// - `is_id_mode`: the input is the id verbatim.
/// - Otherwise, for an absolute http(s) URL with `fuzzy`, the known share-link
///   shapes are tried in order and the first match's id is used.
/// - For an http(s) URL without `fuzzy`, only the `id` query parameter of a
///   Drive `/uc` or `/open` link and the id of a Drive folder link are
///   honoured; any other URL is fetched directly.
/// - Anything else is taken as a bare id.
///
/// # Errors
///
/// - [`LocatorError::Empty`] for empty input
/// - [`LocatorError::Unresolvable`] when fuzzy extraction matches nothing
#[instrument(level = "debug", fields(input = %input))]
pub fn parse_resource(
    input: &str,
    is_id_mode: bool,
    fuzzy: bool,
) -> Result<ResourceDescriptor, LocatorError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LocatorError::Empty);
    }

    if is_id_mode || !is_http_url(input) {
        return Ok(ResourceDescriptor::new(ResourceKind::Unknown, input));
    }

    if fuzzy {
        let descriptor = extract_fuzzy(input).ok_or_else(|| LocatorError::unresolvable(input))?;
        debug!(id = %descriptor.id, kind = %descriptor.kind, "fuzzy match");
        return Ok(descriptor);
    }

    if let Some(descriptor) = extract_query_id(input) {
        return Ok(descriptor);
    }

    debug!("no Drive id in URL; fetching directly");
    Ok(ResourceDescriptor::direct(input))
}

/// Returns true if `url` points at a Drive host.
#[must_use]
pub fn is_drive_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| DRIVE_HOSTS.contains(&host.as_str()))
}

fn is_http_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn extract_fuzzy(url: &str) -> Option<ResourceDescriptor> {
    SHARE_PATTERNS.iter().find_map(|pattern| {
        pattern
            .regex
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|id| ResourceDescriptor::new(pattern.kind, id.as_str()))
    })
}

fn extract_query_id(url: &str) -> Option<ResourceDescriptor> {
    if !is_drive_url(url) {
        return None;
    }
    let parsed = Url::parse(url).ok()?;
    if let Some(id) = folder_path_id(&parsed) {
        return Some(ResourceDescriptor::new(ResourceKind::Folder, id));
    }
    let kind = match parsed.path() {
        "/uc" | "/download" => ResourceKind::File,
        "/open" => ResourceKind::Unknown,
        _ => return None,
    };
    parsed
        .query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, id)| ResourceDescriptor::new(kind, id.into_owned()))
}

/// Id segment of `/drive/folders/<id>`, `/drive/u/<n>/folders/<id>`, or `/folders/<id>`.
fn folder_path_id(url: &Url) -> Option<&str> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    if !matches!(segments.first(), Some(&("drive" | "folders"))) {
        return None;
    }
    let position = segments.iter().position(|s| *s == "folders")?;
    segments.get(position + 1).copied().filter(|id| {
        !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    })
}
