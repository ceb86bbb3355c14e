//! Wire types for the `files` metadata and listing API.

use serde::Deserialize;

use crate::locator::{ResourceDescriptor, ResourceKind};

/// MIME type the service uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// One file or folder as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Service identifier.
    pub id: String,
    /// Display name; untrusted for filesystem use until sanitized.
    pub name: String,
    /// MIME type; folders use [`FOLDER_MIME_TYPE`].
    #[serde(default)]
    pub mime_type: String,
}

impl RemoteFile {
    /// Returns true if this entry is a folder.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Converts the entry into a descriptor.
    #[must_use]
    pub fn to_descriptor(&self, export_format: Option<&str>) -> ResourceDescriptor {
        let kind = if self.is_folder() {
            ResourceKind::Folder
        } else {
            ResourceKind::File
        };
        ResourceDescriptor::new(kind, self.id.clone())
            .with_export_format(export_format.map(str::to_string))
    }
}

/// One page of a children listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileListPage {
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    /// Opaque continuation token; absent on the last page.
    pub next_page_token: Option<String>,
}
