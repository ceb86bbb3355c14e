//! Service endpoint configuration.
//!
//! Production code uses [`ServiceEndpoints::default`]; tests point every
//! endpoint at a local mock server.

use url::Url;

/// Default download endpoint (`?id=<id>&export=download`).
pub const DEFAULT_DOWNLOAD_URL: &str = "https://drive.google.com/uc";

/// Default folder listing API base.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Default base of the public folder pages (`{base}/<id>`).
pub const DEFAULT_FOLDER_PAGE_BASE: &str = "https://drive.google.com/drive/folders";

/// Base URLs for the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    /// Download endpoint taking `id`, `export`, and confirmation parameters.
    pub download_url: String,
    /// Base of the `files` metadata and listing API.
    pub api_base: String,
    /// Base of the public folder pages, read when no API key is set.
    pub folder_page_base: String,
    /// API key for the listing API. Without one, folders are read from
    /// their public pages.
    pub api_key: Option<String>,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            folder_page_base: DEFAULT_FOLDER_PAGE_BASE.to_string(),
            api_key: None,
        }
    }
}

impl ServiceEndpoints {
    /// Points every endpoint at one base URL (`{base}/uc`, `{base}/drive/v3`,
    /// and `{base}/drive/folders`).
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            download_url: format!("{base}/uc"),
            api_base: format!("{base}/drive/v3"),
            folder_page_base: format!("{base}/drive/folders"),
            api_key: None,
        }
    }

    /// Sets the listing API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Builds the download URL for `id`, with optional export format.
    ///
    /// Returns `None` if the configured download endpoint is not a valid URL.
    #[must_use]
    pub fn file_download_url(&self, id: &str, export_format: Option<&str>) -> Option<Url> {
        let mut url = Url::parse(&self.download_url).ok()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("id", id).append_pair("export", "download");
            if let Some(format) = export_format {
                pairs.append_pair("format", format);
            }
        }
        Some(url)
    }

    /// Builds the metadata URL for a single file or folder.
    #[must_use]
    pub fn metadata_url(&self, id: &str) -> Option<Url> {
        let base = self.api_base.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/files/{}", urlencoding::encode(id))).ok()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("fields", "id,name,mimeType")
                .append_pair("supportsAllDrives", "true");
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }
        Some(url)
    }

    /// Builds the public page URL for folder `id`.
    #[must_use]
    pub fn folder_page_url(&self, id: &str) -> Option<Url> {
        let base = self.folder_page_base.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{}", urlencoding::encode(id))).ok()?;
        url.query_pairs_mut().append_pair("hl", "en");
        Some(url)
    }

    /// Builds one page of the children listing for folder `id`.
    #[must_use]
    pub fn listing_url(&self, id: &str, page_token: Option<&str>) -> Option<Url> {
        let base = self.api_base.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/files")).ok()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &format!("'{id}' in parents and trashed = false"))
                .append_pair("fields", "nextPageToken,files(id,name,mimeType)")
                .append_pair("orderBy", "folder,name")
                .append_pair("supportsAllDrives", "true")
                .append_pair("includeItemsFromAllDrives", "true");
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }
        Some(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_download_url_has_id_and_export() {
        let url = ServiceEndpoints::default()
            .file_download_url("abc", None)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://drive.google.com/uc?id=abc&export=download"
        );
    }

    #[test]
    fn test_file_download_url_passes_format_hint() {
        let url = ServiceEndpoints::default()
            .file_download_url("abc", Some("docx"))
            .unwrap();
        assert!(url.as_str().ends_with("&format=docx"), "{url}");
    }

    #[test]
    fn test_with_base_trims_trailing_slash() {
        let endpoints = ServiceEndpoints::with_base("http://127.0.0.1:9000/");
        assert_eq!(endpoints.download_url, "http://127.0.0.1:9000/uc");
        assert_eq!(endpoints.api_base, "http://127.0.0.1:9000/drive/v3");
        assert_eq!(
            endpoints.folder_page_base,
            "http://127.0.0.1:9000/drive/folders"
        );
    }

    #[test]
    fn test_folder_page_url_requests_english_page() {
        let url = ServiceEndpoints::default().folder_page_url("1Abc").unwrap();
        assert_eq!(
            url.as_str(),
            "https://drive.google.com/drive/folders/1Abc?hl=en"
        );
    }

    #[test]
    fn test_listing_url_includes_page_token_and_key() {
        let endpoints = ServiceEndpoints::default().with_api_key(Some("k".into()));
        let url = endpoints.listing_url("folder1", Some("tok")).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&(
            "q".to_string(),
            "'folder1' in parents and trashed = false".to_string()
        )));
        assert!(pairs.contains(&("pageToken".to_string(), "tok".to_string())));
        assert!(pairs.contains(&("key".to_string(), "k".to_string())));
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let endpoints = ServiceEndpoints::default().with_api_key(Some(String::new()));
        assert!(endpoints.api_key.is_none());
    }
}
