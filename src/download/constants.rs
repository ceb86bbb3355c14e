//! Constants for the download module (timeouts, chunking).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Accounting unit for streaming and throttling (512 KiB).
pub const CHUNK_SIZE: usize = 512 * 1024;

/// Placeholder path used in errors when writing to a caller-supplied stream.
pub const STREAM_PATH_LABEL: &str = "<stream>";
