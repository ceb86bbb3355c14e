//! Download engine for streaming Drive files to disk.
//!
//! # Features
//!
//! - Interstitial "can't scan for viruses" page confirmation (one retry)
//! - Streaming downloads in fixed-size chunks
//! - Resume via HTTP range requests, restarting when the server ignores them
//! - Per-session bandwidth throttling
//! - Byte progress bar per transfer on stderr, off unless requested
//! - Filename derivation from Content-Disposition with sanitization
//! - Configurable proxy, cookies, TLS verification, and timeouts
//!
//! # Example
//!
//! ```no_run
//! use drivedl_core::download::{Destination, DownloadEngine, SessionOptions};
//! use drivedl_core::locator::parse_resource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::default();
//! let descriptor = parse_resource("https://drive.google.com/uc?id=1A2B3C", false, false)?;
//! let outcome = engine
//!     .download(&descriptor, Destination::Directory(".".into()), &SessionOptions::default())
//!     .await?;
//! println!("wrote {} bytes", outcome.bytes_written);
//! # Ok(())
//! # }
//! ```

mod client;
mod confirm;
mod constants;
mod engine;
mod error;
mod filename;
mod progress;
mod session;
pub mod throttle;

pub(crate) use client::{Fetcher, build_client};
pub(crate) use filename::sanitize_filename;

pub use confirm::{ConfirmationToken, extract_confirmation_token};
pub use constants::{CHUNK_SIZE, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use engine::{Destination, DownloadEngine, DownloadOutcome};
pub use error::DownloadError;
pub use session::SessionOptions;
pub use throttle::{RateParseError, Throttle, parse_byte_rate};
