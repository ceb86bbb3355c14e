//! Download engine: resolves a descriptor to bytes and streams them out.
//!
//! One call to [`DownloadEngine::download`] builds its own HTTP client from the
//! session options, requests the resource, gets past the interstitial warning
//! page if one comes back, and streams the body to a directory, file path, or
//! caller-supplied writer.

use std::fmt;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::ProgressBar;
use reqwest::header::{CONTENT_RANGE, HeaderMap};
use reqwest::{Response, StatusCode};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::{Fetcher, build_client};
use super::confirm::{PageRefusal, classify_refusal, extract_confirmation_token, looks_like_interstitial};
use super::constants::{CHUNK_SIZE, STREAM_PATH_LABEL};
use super::error::DownloadError;
use super::filename::derive_filename;
use super::progress::transfer_bar;
use super::session::SessionOptions;
use super::throttle::Throttle;
use crate::endpoints::ServiceEndpoints;
use crate::locator::{ResourceDescriptor, is_drive_url};

/// Where downloaded bytes go.
pub enum Destination<'w> {
    /// Directory; the filename is derived from the response.
    Directory(PathBuf),
    /// Exact output path.
    File(PathBuf),
    /// Already-open writer (e.g. stdout). Resume does not apply.
    Writer(&'w mut (dyn AsyncWrite + Unpin + Send)),
}

impl fmt::Debug for Destination<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(dir) => f.debug_tuple("Directory").field(dir).finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Output path, or `None` for writer destinations.
    pub path: Option<PathBuf>,
    /// Bytes written by this call (excludes bytes already on disk before a resume).
    pub bytes_written: u64,
    /// Whether the transfer continued an existing partial file.
    pub resumed: bool,
}

/// Resolves resource descriptors to byte streams.
///
/// Holds only the service endpoints; all per-transfer state lives in the call.
#[derive(Debug, Clone, Default)]
pub struct DownloadEngine {
    endpoints: ServiceEndpoints,
}

impl DownloadEngine {
    /// Creates an engine for the given service endpoints.
    #[must_use]
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self { endpoints }
    }

    /// Returns the configured service endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    /// Downloads `descriptor` into `destination`.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Resolution`] if no byte stream could be obtained
    ///   (not found, permission denied, quota, timeout, unconfirmable warning page)
    /// - [`DownloadError::Transport`] for network or proxy failures
    /// - [`DownloadError::Io`] if writing the output fails
    /// - [`DownloadError::Client`] / [`DownloadError::InvalidUrl`] for bad configuration
    #[instrument(skip(self, descriptor, session), fields(id = %descriptor.id))]
    pub async fn download(
        &self,
        descriptor: &ResourceDescriptor,
        destination: Destination<'_>,
        session: &SessionOptions,
    ) -> Result<DownloadOutcome, DownloadError> {
        let client = build_client(session)?;
        let fetcher = Fetcher::new(&client, &descriptor.id, session.proxy.is_some());

        // A known output path can be resumed with the very first request.
        let resume_from = match &destination {
            Destination::File(path) if session.resume => existing_len(path).await,
            _ => None,
        };
        let (response, url) = self.open_stream(&fetcher, descriptor, resume_from).await?;

        match destination {
            Destination::Writer(writer) => {
                if session.resume {
                    debug!("resume does not apply to stream destinations");
                }
                let label = Path::new(STREAM_PATH_LABEL);
                let bytes_written =
                    stream_body(response, writer, session, &fetcher, &url, label, 0).await?;
                info!(bytes = bytes_written, "download complete");
                Ok(DownloadOutcome {
                    path: None,
                    bytes_written,
                    resumed: false,
                })
            }
            Destination::Directory(dir) => {
                let path = dir.join(derive_filename(response.headers(), descriptor));
                debug!(path = %path.display(), "resolved output path");
                write_file(&fetcher, response, None, &url, &path, session).await
            }
            Destination::File(path) => {
                write_file(&fetcher, response, resume_from, &url, &path, session).await
            }
        }
    }

    /// Requests the resource, ranged from `range_from` when set, and confirms
    /// through an interstitial page at most once.
    async fn open_stream(
        &self,
        fetcher: &Fetcher<'_>,
        descriptor: &ResourceDescriptor,
        range_from: Option<u64>,
    ) -> Result<(Response, Url), DownloadError> {
        let (url, service_page) = self.initial_url(descriptor)?;
        let response = fetcher.get(&url, range_from).await?;
        if !service_page
            || response.status() == StatusCode::RANGE_NOT_SATISFIABLE
            || !looks_like_interstitial(response.headers())
        {
            return Ok((response, url));
        }

        let body = response
            .text()
            .await
            .map_err(|e| fetcher.map_transport(&url, e))?;
        let Some(token) = extract_confirmation_token(&body) else {
            return Err(match classify_refusal(&body) {
                PageRefusal::Quota => DownloadError::throttled(
                    &descriptor.id,
                    "too many users have downloaded this file recently",
                ),
                PageRefusal::Permission => {
                    DownloadError::not_shared(&descriptor.id, "the file is not publicly accessible")
                }
                PageRefusal::Unrecognized => DownloadError::unexpected_page(&descriptor.id),
            });
        };

        debug!(uuid = token.uuid.is_some(), "warning page received; confirming");
        let confirmed = token.apply(&url);
        let response = fetcher.get(&confirmed, range_from).await?;
        if response.status() != StatusCode::RANGE_NOT_SATISFIABLE
            && looks_like_interstitial(response.headers())
        {
            return Err(DownloadError::resolution(
                &descriptor.id,
                "confirmation retry still returned a warning page",
            ));
        }
        Ok((response, confirmed))
    }

    /// Returns the first URL to request, and whether it is a service page that
    /// may answer with an interstitial.
    fn initial_url(&self, descriptor: &ResourceDescriptor) -> Result<(Url, bool), DownloadError> {
        if let Some(source) = descriptor.source_url.as_deref() {
            let url = Url::parse(source).map_err(|_| DownloadError::invalid_url(source))?;
            return Ok((url, is_drive_url(source)));
        }
        let url = self
            .endpoints
            .file_download_url(&descriptor.id, descriptor.export_format.as_deref())
            .ok_or_else(|| DownloadError::invalid_url(&self.endpoints.download_url))?;
        Ok((url, true))
    }
}

/// Length of an existing non-empty file at `path`.
async fn existing_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .map(|meta| meta.len())
        .filter(|len| *len > 0)
}

/// Writes the body to `path`, resuming from an existing partial file when asked.
///
/// `ranged_from` is the offset `response` was already requested from; without
/// it, a resumable partial file costs one more ranged request.
async fn write_file(
    fetcher: &Fetcher<'_>,
    response: Response,
    ranged_from: Option<u64>,
    url: &Url,
    path: &Path,
    session: &SessionOptions,
) -> Result<DownloadOutcome, DownloadError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }

    let existing_bytes = match ranged_from {
        Some(offset) => offset,
        None if session.resume => existing_len(path).await.unwrap_or(0),
        None => 0,
    };

    let mut response = response;
    let mut append = false;
    if existing_bytes > 0 {
        let ranged = if ranged_from.is_some() {
            response
        } else {
            drop(response);
            fetcher.get(url, Some(existing_bytes)).await?
        };
        let status = ranged.status();
        if status == StatusCode::PARTIAL_CONTENT
            && content_range_start(ranged.headers()) == Some(existing_bytes)
        {
            debug!(offset = existing_bytes, "resuming partial file");
            response = ranged;
            append = true;
        } else if status == StatusCode::RANGE_NOT_SATISFIABLE
            && content_range_total(ranged.headers()) == Some(existing_bytes)
        {
            info!(path = %path.display(), bytes = existing_bytes, "file already complete");
            return Ok(DownloadOutcome {
                path: Some(path.to_path_buf()),
                bytes_written: 0,
                resumed: true,
            });
        } else if status == StatusCode::OK {
            warn!(path = %path.display(), "server ignored range request; restarting from zero");
            response = ranged;
        } else {
            warn!(
                path = %path.display(),
                status = status.as_u16(),
                "unusable range response; restarting from zero"
            );
            response = fetcher.get(url, None).await?;
        }
    }

    let file = if append {
        OpenOptions::new().append(true).open(path).await
    } else {
        File::create(path).await
    }
    .map_err(|e| DownloadError::io(path, e))?;

    let offset = if append { existing_bytes } else { 0 };
    let mut writer = BufWriter::new(file);
    match stream_body(response, &mut writer, session, fetcher, url, path, offset).await {
        Ok(bytes_written) => {
            info!(
                path = %path.display(),
                bytes = bytes_written,
                resumed = append,
                "download complete"
            );
            Ok(DownloadOutcome {
                path: Some(path.to_path_buf()),
                bytes_written,
                resumed: append,
            })
        }
        Err(error) => {
            // A partial file is only worth keeping if a later run may resume it.
            if !session.resume {
                debug!(path = %path.display(), "removing partial file after error");
                let _ = tokio::fs::remove_file(path).await;
            }
            Err(error)
        }
    }
}

/// Streams the response body into `writer` in `CHUNK_SIZE` pieces, throttled.
///
/// `offset` is the number of bytes already on disk before this transfer.
async fn stream_body<W>(
    response: Response,
    writer: &mut W,
    session: &SessionOptions,
    fetcher: &Fetcher<'_>,
    url: &Url,
    path: &Path,
    offset: u64,
) -> Result<u64, DownloadError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let total = response.content_length().map(|len| len.saturating_add(offset));
    let label = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
    let progress = transfer_bar(session.progress, &label, total, offset);

    let mut throttle = Throttle::new(session.speed);
    if throttle.is_limited() {
        debug!(bytes_per_sec = ?session.speed, "throttling transfer");
    }

    let result = copy_chunks(response, writer, &mut throttle, &progress, fetcher, url, path).await;
    match &result {
        Ok(_) => progress.finish_and_clear(),
        Err(_) => progress.abandon(),
    }
    result.map(|()| throttle.transferred())
}

async fn copy_chunks<W>(
    response: Response,
    writer: &mut W,
    throttle: &mut Throttle,
    progress: &ProgressBar,
    fetcher: &Fetcher<'_>,
    url: &Url,
    path: &Path,
) -> Result<(), DownloadError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| fetcher.map_transport(url, e))?;
        for piece in chunk.chunks(CHUNK_SIZE) {
            writer
                .write_all(piece)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            progress.inc(piece.len() as u64);
            throttle.record(piece.len()).await;
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(path, e))
}

/// Start offset of `Content-Range: bytes <start>-<end>/<total>`.
fn content_range_start(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let range = value.trim().strip_prefix("bytes ")?;
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

/// Total size from `Content-Range: bytes <range>/<total>` or `bytes */<total>`.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}
