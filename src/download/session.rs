//! Per-call download options.

use std::time::Duration;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Options for a single download call.
///
/// A session is owned by the call that uses it: throttling, cookies, and the
/// HTTP client built from it never outlive that call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Continue a partially downloaded file with a ranged request.
    pub resume: bool,
    /// Target transfer rate in bytes per second (`None` = unlimited).
    pub speed: Option<u64>,
    /// Proxy endpoint for all requests (`http://`, `https://`, or `socks5://`).
    pub proxy: Option<String>,
    /// Keep cookies between the requests of this session.
    pub use_cookies: bool,
    /// Verify the server's TLS certificate.
    pub verify_tls: bool,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Maximum idle time between reads.
    pub read_timeout: Duration,
    /// Draw a byte progress bar on stderr for each transfer.
    pub progress: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            resume: false,
            speed: None,
            proxy: None,
            use_cookies: true,
            verify_tls: true,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            progress: false,
        }
    }
}

impl SessionOptions {
    /// Returns a copy with resume enabled or disabled.
    #[must_use]
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Returns a copy with the given rate limit.
    #[must_use]
    pub fn with_speed(mut self, speed: Option<u64>) -> Self {
        self.speed = speed.filter(|s| *s > 0);
        self
    }
}
