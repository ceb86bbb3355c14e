//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use drivedl_core::{FailurePolicy, MAX_NUMBER_FILES, parse_byte_rate};

/// Download files and folders from Drive share links or ids.
#[derive(Parser, Debug)]
#[command(name = "drivedl")]
#[command(author, version, about)]
pub struct Args {
    /// URL, or file/folder id (with --id or when not an http(s) URL)
    pub url_or_id: String,

    /// Output file name or directory; "-" writes the file to stdout
    #[arg(short = 'O', long)]
    pub output: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress logging except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Extract the id from any recognizable share link
    #[arg(long)]
    pub fuzzy: bool,

    /// Treat the argument as a file/folder id
    #[arg(long)]
    pub id: bool,

    /// Download through <protocol://host:port>
    #[arg(long)]
    pub proxy: Option<String>,

    /// Download speed limit, e.g. 10MB for 10 MiB/s
    #[arg(long, value_parser = parse_speed)]
    pub speed: Option<u64>,

    /// Do not keep cookies between requests
    #[arg(long)]
    pub no_cookies: bool,

    /// Do not check the server's TLS certificate
    #[arg(long)]
    pub no_check_certificate: bool,

    /// Resume a partially downloaded file
    #[arg(short = 'c', long = "continue")]
    pub resume: bool,

    /// Download an entire folder
    #[arg(long, conflicts_with = "cache")]
    pub folder: bool,

    /// Visit every folder entry even past the entry cap
    #[arg(long, requires = "folder")]
    pub remaining_ok: bool,

    /// Maximum folder entries without --remaining-ok
    #[arg(long, requires = "folder", value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub max_files: Option<u32>,

    /// What to do when a folder file fails: abort or skip
    #[arg(long, requires = "folder")]
    pub on_error: Option<FailurePolicy>,

    /// Export format for Docs, Sheets, and Slides (e.g. docx, xlsx, pptx)
    #[arg(long)]
    pub format: Option<String>,

    /// Download through the local cache and print the cached path
    #[arg(long)]
    pub cache: bool,

    /// Cache root directory
    #[arg(long, requires = "cache")]
    pub cache_dir: Option<PathBuf>,

    /// Expected MD5 of the cached file (32 hex characters)
    #[arg(long, requires = "cache")]
    pub md5: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the file service
    #[arg(long, hide = true)]
    pub endpoint_base: Option<String>,
}

impl Args {
    /// Whether the output goes to stdout.
    #[must_use]
    pub fn output_is_stdout(&self) -> bool {
        self.output.as_deref() == Some("-")
    }

    /// Folder cap from flags, falling back to the built-in default.
    #[must_use]
    pub fn max_files_or(&self, configured: Option<usize>) -> usize {
        self.max_files
            .and_then(|v| usize::try_from(v).ok())
            .or(configured)
            .unwrap_or(MAX_NUMBER_FILES)
    }
}

fn parse_speed(value: &str) -> Result<u64, String> {
    parse_byte_rate(value).map_err(|e| e.to_string())
}
