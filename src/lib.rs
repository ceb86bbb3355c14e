//! drivedl core library
//!
//! Resolves Drive share links or bare identifiers into byte streams and
//! writes them to local storage, with resumable transfer, bandwidth
//! throttling, checksum-verified caching, and capped folder retrieval.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`checksum`] - Streaming MD5 digests and verification
//! - [`locator`] - Input text to [`ResourceDescriptor`] parsing (no I/O)
//! - [`download`] - Download engine: interstitial confirmation, resume, throttling
//! - [`folder`] - Paginated, capped folder enumeration and sequential download
//! - [`cache`] - Checksum-gated, lock-protected atomic local cache
//! - [`endpoints`] - Service endpoint configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod checksum;
pub mod download;
pub mod endpoints;
pub mod folder;
pub mod locator;
mod user_agent;

// Re-export commonly used types
pub use cache::{CacheError, CacheManager, derive_cache_file_name};
pub use checksum::{ChecksumError, md5_digest, verify_md5};
pub use download::{
    Destination, DownloadEngine, DownloadError, DownloadOutcome, SessionOptions,
    extract_confirmation_token, parse_byte_rate,
};
pub use endpoints::ServiceEndpoints;
pub use folder::{
    FailurePolicy, FolderError, FolderReport, FolderWalk, FolderWalker, MAX_NUMBER_FILES,
};
pub use locator::{LocatorError, ResourceDescriptor, ResourceKind, parse_resource};
