//! Per-session bandwidth throttling.
//!
//! A [`Throttle`] belongs to one transfer. After each chunk it compares the
//! elapsed time with the time the bytes so far should have taken at the target
//! rate, and sleeps the difference. Nothing is shared between sessions.
//!
//! # Example
//!
//! ```
//! use drivedl_core::download::Throttle;
//!
//! # async fn example() {
//! let mut throttle = Throttle::new(Some(1024 * 1024));
//! throttle.record(64 * 1024).await;
//! # }
//! ```

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// Enforces a target byte rate on a single transfer.
#[derive(Debug)]
pub struct Throttle {
    bytes_per_sec: Option<u64>,
    started: Instant,
    transferred: u64,
}

impl Throttle {
    /// Creates a throttle; `None` or `Some(0)` disables it.
    #[must_use]
    pub fn new(bytes_per_sec: Option<u64>) -> Self {
        Self {
            bytes_per_sec: bytes_per_sec.filter(|rate| *rate > 0),
            started: Instant::now(),
            transferred: 0,
        }
    }

    /// Returns whether a rate limit is in effect.
    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.bytes_per_sec.is_some()
    }

    /// Total bytes recorded so far.
    #[must_use]
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Records a transferred chunk and sleeps off any lead over the target rate.
    pub async fn record(&mut self, chunk_len: usize) {
        self.transferred = self.transferred.saturating_add(chunk_len as u64);
        let Some(rate) = self.bytes_per_sec else {
            return;
        };

        #[allow(clippy::cast_precision_loss)]
        let due = Duration::from_secs_f64(self.transferred as f64 / rate as f64);
        let elapsed = self.started.elapsed();
        if let Some(deficit) = due.checked_sub(elapsed)
            && !deficit.is_zero()
        {
            trace!(
                deficit_ms = deficit.as_millis(),
                transferred = self.transferred,
                "throttling"
            );
            tokio::time::sleep(deficit).await;
        }
    }
}

/// Error for malformed rate strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rate '{input}': expected <number><unit> with unit B, KB, MB, or GB (e.g. 10MB)")]
pub struct RateParseError {
    /// The rejected input.
    pub input: String,
}

/// Parses a rate like `10MB`, `512KB`, `1GB`, or `100B` into bytes per second.
///
/// Units are binary (KB = 1024 bytes).
///
/// # Errors
///
/// Returns [`RateParseError`] for a missing number, unknown unit, or overflow.
pub fn parse_byte_rate(input: &str) -> Result<u64, RateParseError> {
    let trimmed = input.trim();
    let err = || RateParseError {
        input: input.to_string(),
    };
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(err)?;
    let (digits, unit) = trimmed.split_at(split);
    let value: u64 = digits.parse().map_err(|_| err())?;
    let multiplier: u64 = match unit.to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => return Err(err()),
    };
    value.checked_mul(multiplier).ok_or_else(err)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unlimited_throttle_never_sleeps() {
        let mut throttle = Throttle::new(None);
        let start = std::time::Instant::now();
        throttle.record(10 * 1024 * 1024).await;
        assert!(!throttle.is_limited());
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(throttle.transferred(), 10 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_limited_throttle_holds_target_rate() {
        // 2_000 bytes at 10_000 B/s must take at least 200ms.
        let mut throttle = Throttle::new(Some(10_000));
        let start = std::time::Instant::now();
        for _ in 0..4 {
            throttle.record(500).await;
        }
        assert!(
            start.elapsed() >= Duration::from_millis(190),
            "elapsed {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn test_zero_rate_disables() {
        assert!(!Throttle::new(Some(0)).is_limited());
    }

    #[test]
    fn test_parse_byte_rate_units() {
        assert_eq!(parse_byte_rate("100B").unwrap(), 100);
        assert_eq!(parse_byte_rate("512KB").unwrap(), 512 * 1024);
        assert_eq!(parse_byte_rate("10MB").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_byte_rate("1gb").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_byte_rate_rejects_malformed() {
        assert!(parse_byte_rate("fast").is_err());
        assert!(parse_byte_rate("10").is_err());
        assert!(parse_byte_rate("10TB").is_err());
        assert!(parse_byte_rate("MB").is_err());
    }
}
