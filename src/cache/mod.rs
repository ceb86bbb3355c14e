//! Checksum-gated local cache over the download engine.
//!
//! Downloads land in a private temporary directory under the cache root and
//! are moved into place while holding an advisory lock on `<root>/_dl_lock`.
//! Readers never observe a partially written cache file, and concurrent
//! processes sharing one root serialize only the final move.
//!
//! An existing file is trusted without re-hashing when no checksum is given.
//! Pass an expected MD5 to have it verified, and re-downloaded on mismatch.

mod error;

pub use error::CacheError;

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, info, instrument, warn};

use crate::checksum::{ChecksumError, validate_expected_md5, verify_md5};
use crate::download::{Destination, DownloadEngine, SessionOptions};
use crate::locator::parse_resource;

/// Name of the advisory lock file inside the cache root.
pub const LOCK_FILE_NAME: &str = "_dl_lock";

/// Temporary download directories older than this are removed on open.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// How long to wait for the cache lock before giving up.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(120);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);
const TEMP_PREFIX: &str = ".tmp-dl-";
const TEMP_FILE_NAME: &str = "dl";

/// Hook run on the published file after a fresh download.
pub type Postprocess<'a> =
    &'a (dyn Fn(&Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync);

/// Maps a URL to a flat cache file name.
///
/// ```
/// use drivedl_core::derive_cache_file_name;
///
/// assert_eq!(
///     derive_cache_file_name("https://x.org/uc?id=1"),
///     "https-COLON--SLASH--SLASH-x.org-SLASH-uc-QUESTION-id-EQUAL-1"
/// );
/// ```
#[must_use]
pub fn derive_cache_file_name(url: &str) -> String {
    url.replace('/', "-SLASH-")
        .replace(':', "-COLON-")
        .replace('=', "-EQUAL-")
        .replace('?', "-QUESTION-")
}

/// Default cache root: `$XDG_CACHE_HOME/drivedl`, else `$HOME/.cache/drivedl`.
#[must_use]
pub fn default_cache_root() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join("drivedl"));
    }
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| PathBuf::from(home).join(".cache").join("drivedl"))
}

/// Local cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct CacheManager {
    root: PathBuf,
    engine: DownloadEngine,
    session: SessionOptions,
    fuzzy: bool,
}

impl CacheManager {
    /// Opens (creating if needed) the cache at `root`.
    ///
    /// Temporary directories left behind by crashed downloads are swept if
    /// they are older than [`STALE_TEMP_AGE`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the root cannot be created.
    pub fn open(root: impl Into<PathBuf>, engine: DownloadEngine) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| CacheError::io(&root, e))?;

        let swept = sweep_stale_temp_dirs(&root, STALE_TEMP_AGE);
        if swept > 0 {
            info!(root = %root.display(), swept, "removed stale temporary downloads");
        }

        Ok(Self {
            root,
            engine,
            session: SessionOptions::default(),
            fuzzy: false,
        })
    }

    /// Sets the session options used for downloads. Resume is always off.
    #[must_use]
    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session.with_resume(false);
        self
    }

    /// Enables fuzzy extraction of identifiers from URLs.
    #[must_use]
    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// The cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns a local path holding the content of `url`, downloading only when needed.
    ///
    /// Without `file_path` the file lives in the cache root under
    /// [`derive_cache_file_name`]. `postprocess` runs after a fresh download only.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Checksum`] if `expected_md5` is malformed (before any I/O),
    ///   or a freshly downloaded file does not match it
    /// - [`CacheError::Locator`] / [`CacheError::Download`] if the download fails;
    ///   any existing file at the target is left untouched
    /// - [`CacheError::Lock`] / [`CacheError::Io`] if publishing fails
    /// - [`CacheError::Postprocess`] if the hook fails
    #[instrument(skip(self, expected_md5, postprocess), fields(root = %self.root.display()))]
    pub async fn cached_download(
        &self,
        url: &str,
        file_path: Option<&Path>,
        expected_md5: Option<&str>,
        postprocess: Option<Postprocess<'_>>,
    ) -> Result<PathBuf, CacheError> {
        let expected = expected_md5.map(str::trim).filter(|s| !s.is_empty());
        if let Some(expected) = expected {
            validate_expected_md5(expected)?;
        }

        let target = match file_path {
            Some(path) => path.to_path_buf(),
            None => self.root.join(derive_cache_file_name(url)),
        };

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            match expected {
                None => {
                    info!(path = %target.display(), "file already exists");
                    return Ok(target);
                }
                Some(expected) => match verify_blocking(&target, expected).await {
                    Ok(()) => {
                        info!(path = %target.display(), "MD5 matches");
                        return Ok(target);
                    }
                    Err(ChecksumError::Mismatch { actual, .. }) => {
                        warn!(
                            path = %target.display(),
                            actual = %actual,
                            expected = %expected,
                            "MD5 mismatch on cached file, downloading again"
                        );
                    }
                    Err(error) => return Err(error.into()),
                },
            }
        }

        let descriptor = parse_resource(url, false, self.fuzzy)?;
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(parent, e))?;
        }

        // Dropping `temp` on any early return removes the directory and its contents.
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| CacheError::io(&self.root, e))?;
        let temp_file = temp.path().join(TEMP_FILE_NAME);

        info!(path = %target.display(), "cached download in progress");
        let outcome = self
            .engine
            .download(&descriptor, Destination::File(temp_file.clone()), &self.session)
            .await?;
        debug!(bytes = outcome.bytes_written, "downloaded into temporary directory");

        publish(self.root.join(LOCK_FILE_NAME), temp_file, target.clone()).await?;
        if let Err(error) = temp.close() {
            debug!(error = %error, "failed to remove temporary directory");
        }

        if let Some(expected) = expected {
            verify_blocking(&target, expected).await?;
        }

        if let Some(hook) = postprocess {
            hook(&target).map_err(|source| CacheError::Postprocess {
                path: target.clone(),
                source,
            })?;
        }

        Ok(target)
    }
}

async fn verify_blocking(path: &Path, expected: &str) -> Result<(), ChecksumError> {
    let owned_path = path.to_path_buf();
    let expected = expected.to_string();
    tokio::task::spawn_blocking(move || verify_md5(&owned_path, &expected))
        .await
        .map_err(|e| ChecksumError::io(path, io::Error::other(e)))?
}

/// Moves `from` to `to` under the cache lock.
async fn publish(lock_path: PathBuf, from: PathBuf, to: PathBuf) -> Result<(), CacheError> {
    let target = to.clone();
    tokio::task::spawn_blocking(move || {
        let lock = acquire_lock(&lock_path, LOCK_TIMEOUT)?;
        let result = move_into_place(&from, &to);
        if let Err(error) = FileExt::unlock(&lock) {
            debug!(error = %error, "failed to release cache lock");
        }
        result
    })
    .await
    .map_err(|e| CacheError::io(target, io::Error::other(e)))?
}

fn acquire_lock(path: &Path, timeout: Duration) -> Result<File, CacheError> {
    let lock_error = |source: io::Error| CacheError::Lock {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(lock_error)?;

    let start = Instant::now();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(file),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if start.elapsed() >= timeout {
                    return Err(lock_error(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("timed out after {timeout:?}"),
                    )));
                }
                std::thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(e) => return Err(lock_error(e)),
        }
    }
}

/// Renames, falling back to copy-and-remove across filesystems.
fn move_into_place(from: &Path, to: &Path) -> Result<(), CacheError> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| CacheError::io(to, e))?;
    std::fs::remove_file(from).map_err(|e| CacheError::io(from, e))
}

fn sweep_stale_temp_dirs(root: &Path, max_age: Duration) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let stale = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= max_age);
        if !metadata.is_dir() || !stale {
            continue;
        }
        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(error) => debug!(path = %entry.path().display(), error = %error, "failed to sweep"),
        }
    }
    removed
}
