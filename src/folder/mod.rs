//! Folder enumeration and retrieval.
//!
//! A [`FolderWalk`] pages through a folder's children with opaque continuation
//! tokens and yields `(relative path, descriptor)` entries depth-first. It is
//! lazy and single-use.
//!
//! With an API key configured, children come from the `files` listing API.
//! Without one, each folder's public page is read instead; a page holds the
//! whole listing, so it is a single page with no continuation token. A running count of discovered entries is kept across
//! the whole walk; passing the cap without an override ends the walk with
//! [`FolderError::Capacity`].
//!
//! [`FolderWalker::download_folder`] drives the walk and downloads each file,
//! one at a time, into a directory tree mirroring the folder.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use drivedl_core::download::{DownloadEngine, SessionOptions};
//! use drivedl_core::folder::{FolderOptions, FolderWalker};
//! use drivedl_core::locator::parse_resource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let walker = FolderWalker::new(DownloadEngine::default(), FolderOptions::default());
//! let folder = parse_resource("https://drive.google.com/drive/folders/1Abc", false, true)?;
//! let report = walker
//!     .download_folder(&folder, Path::new("."), &SessionOptions::default())
//!     .await?;
//! println!("{} files in {}", report.downloaded.len(), report.root.display());
//! # Ok(())
//! # }
//! ```

mod error;
mod listing;
mod page;

pub use error::FolderError;
pub use listing::{FOLDER_MIME_TYPE, RemoteFile};

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use futures_util::Stream;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::download::{
    Destination, DownloadEngine, DownloadError, Fetcher, SessionOptions, build_client,
    sanitize_filename,
};
use crate::endpoints::ServiceEndpoints;
use crate::locator::{ResourceDescriptor, ResourceKind};

use listing::FileListPage;
use page::{FolderPage, parse_folder_page};

/// Default cap on discovered entries per walk.
pub const MAX_NUMBER_FILES: usize = 50;

/// What to do when one file of a folder fails to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the walk and return the error.
    #[default]
    Abort,
    /// Record the failure and continue with the next file.
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "unknown failure policy '{other}': expected 'abort' or 'skip'"
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Abort => "abort",
            Self::Skip => "skip",
        })
    }
}

/// Folder retrieval options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderOptions {
    /// Cap on discovered entries.
    pub max_files: usize,
    /// Ignore the cap and visit everything.
    pub remaining_ok: bool,
    /// Per-file failure policy.
    pub on_error: FailurePolicy,
}

impl Default for FolderOptions {
    fn default() -> Self {
        Self {
            max_files: MAX_NUMBER_FILES,
            remaining_ok: false,
            on_error: FailurePolicy::Abort,
        }
    }
}

/// One discovered child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    /// Path relative to the walked folder, built from sanitized names.
    pub relative_path: PathBuf,
    /// Descriptor for the child.
    pub descriptor: ResourceDescriptor,
}

/// A child file that failed under [`FailurePolicy::Skip`].
#[derive(Debug)]
pub struct FolderFailure {
    /// Where the file would have been written.
    pub path: PathBuf,
    /// Why it failed.
    pub error: DownloadError,
}

/// Summary of a folder download.
#[derive(Debug)]
pub struct FolderReport {
    /// Local directory mirroring the walked folder.
    pub root: PathBuf,
    /// Files written, in walk order.
    pub downloaded: Vec<PathBuf>,
    /// Files skipped after a failure.
    pub failures: Vec<FolderFailure>,
}

/// Where folder children are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingSource {
    /// The `files` listing API; needs an API key.
    Api,
    /// The folder's public page.
    FolderPage,
}

struct PendingFolder {
    id: String,
    relative: PathBuf,
    buffered: VecDeque<RemoteFile>,
    next_page: Option<String>,
    listed_first_page: bool,
    /// First page, already fetched while settling the root.
    prefetched: Option<FileListPage>,
}

impl PendingFolder {
    fn new(id: String, relative: PathBuf) -> Self {
        Self {
            id,
            relative,
            buffered: VecDeque::new(),
            next_page: None,
            listed_first_page: false,
            prefetched: None,
        }
    }

    fn has_more_pages(&self) -> bool {
        !self.listed_first_page || self.next_page.is_some()
    }
}

/// Lazy, single-use, depth-first enumeration of a folder.
pub struct FolderWalk {
    client: Client,
    endpoints: ServiceEndpoints,
    source: ListingSource,
    via_proxy: bool,
    root: RemoteFile,
    export_format: Option<String>,
    stack: Vec<PendingFolder>,
    discovered: usize,
    cap: Option<usize>,
}

impl fmt::Debug for FolderWalk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderWalk")
            .field("root", &self.root)
            .field("source", &self.source)
            .field("pending", &self.stack.len())
            .field("discovered", &self.discovered)
            .field("cap", &self.cap)
            .finish_non_exhaustive()
    }
}

impl FolderWalk {
    /// The walked folder as reported by the service.
    #[must_use]
    pub fn root(&self) -> &RemoteFile {
        &self.root
    }

    /// Returns the next entry, fetching listing pages as needed.
    ///
    /// Returns `None` once the folder tree is exhausted. After an error the
    /// walk is finished and also returns `None`.
    pub async fn next_entry(&mut self) -> Option<Result<FolderEntry, FolderError>> {
        loop {
            let top = self.stack.last_mut()?;

            if let Some(file) = top.buffered.pop_front() {
                let relative_path = top.relative.join(sanitize_filename(&file.name));
                let descriptor = file.to_descriptor(self.export_format.as_deref());
                if descriptor.kind == ResourceKind::Folder {
                    self.stack
                        .push(PendingFolder::new(file.id.clone(), relative_path.clone()));
                }
                return Some(Ok(FolderEntry {
                    relative_path,
                    descriptor,
                }));
            }

            if !top.has_more_pages() {
                self.stack.pop();
                continue;
            }

            let prefetched = top.prefetched.take();
            let folder_id = top.id.clone();
            let page_token = top.next_page.clone();
            let page = match prefetched {
                Some(page) => page,
                None => match self.fetch_page(&folder_id, page_token.as_deref()).await {
                    Ok(page) => page,
                    Err(error) => {
                        self.stack.clear();
                        return Some(Err(error));
                    }
                },
            };

            self.discovered += page.files.len();
            if let Some(cap) = self.cap.filter(|cap| self.discovered > *cap) {
                warn!(discovered = self.discovered, cap, "folder exceeds entry cap");
                self.stack.clear();
                return Some(Err(FolderError::capacity(self.discovered, cap)));
            }

            debug!(
                folder = %folder_id,
                entries = page.files.len(),
                more = page.next_page_token.is_some(),
                "listed page"
            );
            if let Some(top) = self.stack.last_mut() {
                top.buffered.extend(page.files);
                top.next_page = page.next_page_token;
                top.listed_first_page = true;
            }
        }
    }

    /// Converts the walk into a `Stream` of entries.
    pub fn into_stream(self) -> impl Stream<Item = Result<FolderEntry, FolderError>> {
        futures_util::stream::unfold(self, |mut walk| async move {
            walk.next_entry().await.map(|item| (item, walk))
        })
    }

    async fn fetch_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<FileListPage, FolderError> {
        let fetcher = Fetcher::new(&self.client, folder_id, self.via_proxy);
        match self.source {
            ListingSource::Api => {
                let url = self
                    .endpoints
                    .listing_url(folder_id, page_token)
                    .ok_or_else(|| DownloadError::invalid_url(&self.endpoints.api_base))?;
                Ok(fetcher.get_json(&url).await?)
            }
            ListingSource::FolderPage => {
                let folder = read_folder_page(&fetcher, &self.endpoints, folder_id)
                    .await?
                    .ok_or_else(|| {
                        DownloadError::resolution(folder_id, "folder page carries no listing")
                    })?;
                Ok(FileListPage {
                    files: folder.files,
                    next_page_token: None,
                })
            }
        }
    }
}

/// Fetches and parses the public page of folder `id`.
///
/// `Ok(None)` means the page was served but holds no folder listing.
async fn read_folder_page(
    fetcher: &Fetcher<'_>,
    endpoints: &ServiceEndpoints,
    id: &str,
) -> Result<Option<FolderPage>, DownloadError> {
    let url = endpoints
        .folder_page_url(id)
        .ok_or_else(|| DownloadError::invalid_url(&endpoints.folder_page_base))?;
    let body = fetcher
        .get(&url, None)
        .await?
        .text()
        .await
        .map_err(|e| fetcher.map_transport(&url, e))?;
    Ok(parse_folder_page(id, &body))
}

/// Walks folders and downloads their files through a [`DownloadEngine`].
#[derive(Debug, Clone, Default)]
pub struct FolderWalker {
    engine: DownloadEngine,
    options: FolderOptions,
}

impl FolderWalker {
    /// Creates a walker.
    #[must_use]
    pub fn new(engine: DownloadEngine, options: FolderOptions) -> Self {
        Self { engine, options }
    }

    /// Returns the walker options.
    #[must_use]
    pub fn options(&self) -> &FolderOptions {
        &self.options
    }

    /// Starts a walk of `descriptor`.
    ///
    /// Fetches the folder's metadata first, which settles an `Unknown` kind.
    /// Without an API key the metadata is the folder's public page, whose
    /// listing is kept as the first page of the walk.
    ///
    /// # Errors
    ///
    /// - [`FolderError::NotAFolder`] if the descriptor is a file
    /// - [`FolderError::Listing`] if the metadata request fails
    #[instrument(skip(self, descriptor, session), fields(id = %descriptor.id))]
    pub async fn walk(
        &self,
        descriptor: &ResourceDescriptor,
        session: &SessionOptions,
    ) -> Result<FolderWalk, FolderError> {
        if descriptor.kind == ResourceKind::File {
            return Err(FolderError::NotAFolder {
                id: descriptor.id.clone(),
            });
        }

        let client = build_client(session)?;
        let endpoints = self.engine.endpoints().clone();
        let via_proxy = session.proxy.is_some();

        let source = if endpoints.api_key.is_some() {
            ListingSource::Api
        } else {
            ListingSource::FolderPage
        };

        let fetcher = Fetcher::new(&client, &descriptor.id, via_proxy);
        let (root, prefetched) = match source {
            ListingSource::Api => {
                let url = endpoints
                    .metadata_url(&descriptor.id)
                    .ok_or_else(|| DownloadError::invalid_url(&endpoints.api_base))?;
                let root: RemoteFile = fetcher.get_json(&url).await?;
                (root, None)
            }
            ListingSource::FolderPage => {
                match read_folder_page(&fetcher, &endpoints, &descriptor.id).await? {
                    Some(folder) => (
                        RemoteFile {
                            id: descriptor.id.clone(),
                            name: folder.name,
                            mime_type: FOLDER_MIME_TYPE.to_string(),
                        },
                        Some(FileListPage {
                            files: folder.files,
                            next_page_token: None,
                        }),
                    ),
                    None => {
                        return Err(FolderError::NotAFolder {
                            id: descriptor.id.clone(),
                        });
                    }
                }
            }
        };
        if !root.is_folder() {
            return Err(FolderError::NotAFolder {
                id: descriptor.id.clone(),
            });
        }
        debug!(name = %root.name, ?source, "walking folder");

        let mut first = PendingFolder::new(root.id.clone(), PathBuf::new());
        first.prefetched = prefetched;
        let cap = (!self.options.remaining_ok).then_some(self.options.max_files);
        Ok(FolderWalk {
            client,
            endpoints,
            source,
            via_proxy,
            stack: vec![first],
            root,
            export_format: descriptor.export_format.clone(),
            discovered: 0,
            cap,
        })
    }

    /// Downloads every file of the folder into `output_dir/<folder name>/...`.
    ///
    /// The tree is listed completely before anything is written. Children are
    /// then processed sequentially in listing order; directories are created as
    /// they are reached.
    ///
    /// # Errors
    ///
    /// - Any error from [`walk`](Self::walk) or from paging the listing
    /// - [`FolderError::Download`] for the first failed file under [`FailurePolicy::Abort`]
    /// - [`FolderError::Io`] if a directory cannot be created
    #[instrument(skip(self, descriptor, session), fields(id = %descriptor.id, output = %output_dir.display()))]
    pub async fn download_folder(
        &self,
        descriptor: &ResourceDescriptor,
        output_dir: &Path,
        session: &SessionOptions,
    ) -> Result<FolderReport, FolderError> {
        let mut walk = self.walk(descriptor, session).await?;
        let root = output_dir.join(sanitize_filename(&walk.root().name));

        // List the whole tree first so a capacity error leaves nothing on disk.
        let mut entries = Vec::new();
        while let Some(entry) = walk.next_entry().await {
            entries.push(entry?);
        }
        info!(entries = entries.len(), "folder listed");

        let mut report = FolderReport {
            root: root.clone(),
            downloaded: Vec::new(),
            failures: Vec::new(),
        };
        ensure_dir(&root).await?;

        for entry in entries {
            let target = root.join(&entry.relative_path);

            if entry.descriptor.kind == ResourceKind::Folder {
                ensure_dir(&target).await?;
                continue;
            }

            info!(path = %target.display(), "downloading folder entry");
            match self
                .engine
                .download(&entry.descriptor, Destination::File(target.clone()), session)
                .await
            {
                Ok(_) => report.downloaded.push(target),
                Err(error) => match self.options.on_error {
                    FailurePolicy::Abort => {
                        return Err(FolderError::Download {
                            path: target,
                            source: error,
                        });
                    }
                    FailurePolicy::Skip => {
                        warn!(path = %target.display(), error = %error, "skipping failed folder entry");
                        report.failures.push(FolderFailure {
                            path: target,
                            error,
                        });
                    }
                },
            }
        }

        info!(
            downloaded = report.downloaded.len(),
            skipped = report.failures.len(),
            "folder download complete"
        );
        Ok(report)
    }
}

async fn ensure_dir(path: &Path) -> Result<(), FolderError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| FolderError::Io {
            path: path.to_path_buf(),
            source,
        })
}
