//! Shared helpers for integration tests.

#![allow(dead_code)]

use drivedl_core::{DownloadEngine, ServiceEndpoints};
use serde_json::{Value, json};
use wiremock::{MockServer, ResponseTemplate};

/// MIME type the listing API uses for folders.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Engine whose endpoints all point at `server`, listing folders through the API.
pub fn engine_for(server: &MockServer) -> DownloadEngine {
    DownloadEngine::new(
        ServiceEndpoints::with_base(&server.uri()).with_api_key(Some("test-key".to_string())),
    )
}

/// Engine without an API key; folders are read from their public pages.
pub fn keyless_engine_for(server: &MockServer) -> DownloadEngine {
    DownloadEngine::new(ServiceEndpoints::with_base(&server.uri()))
}

/// File bytes as the download endpoint serves them.
pub fn file_response(body: impl Into<Vec<u8>>, filename: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/octet-stream")
        .insert_header(
            "content-disposition",
            format!("attachment; filename=\"{filename}\"").as_str(),
        )
        .set_body_bytes(body.into())
}

/// The "can't scan for viruses" warning page carrying a confirmation form.
pub fn interstitial_response(confirm: &str, uuid: &str) -> ResponseTemplate {
    let page = format!(
        r#"<html><body><p>Google Drive can't scan this file for viruses.</p>
<form id="download-form" action="/uc" method="get">
<input type="hidden" name="id" value="x">
<input type="hidden" name="confirm" value="{confirm}">
<input type="hidden" name="uuid" value="{uuid}">
</form></body></html>"#
    );
    ResponseTemplate::new(200)
        .set_body_raw(page, "text/html; charset=utf-8")
}

/// Folder metadata JSON.
pub fn folder_meta(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "mimeType": FOLDER_MIME })
}

/// One listing entry; `folder` selects the folder MIME type.
pub fn entry(id: &str, name: &str, folder: bool) -> Value {
    let mime = if folder { FOLDER_MIME } else { "application/octet-stream" };
    json!({ "id": id, "name": name, "mimeType": mime })
}

/// One listing page.
pub fn page(files: Vec<Value>, next: Option<&str>) -> Value {
    match next {
        Some(token) => json!({ "files": files, "nextPageToken": token }),
        None => json!({ "files": files }),
    }
}

/// Public folder page embedding `entries` (`(id, name, is_folder)`) the way
/// the service does: a JSON array inside an escaped JavaScript string.
pub fn folder_page_response(title: &str, entries: &[(&str, &str, bool)]) -> ResponseTemplate {
    let rows: Vec<Value> = entries
        .iter()
        .map(|(id, name, folder)| {
            let mime = if *folder { FOLDER_MIME } else { "application/octet-stream" };
            json!([id, ["parent"], name, mime])
        })
        .collect();
    let data = json!([rows]).to_string();
    let escaped = data
        .replace('\\', "\\\\")
        .replace('"', "\\x22")
        .replace('\'', "\\x27");
    let page = format!(
        "<html><head><title>{title} - Google Drive</title></head><body>\
         <script>window['_DRIVE_ivd'] = '{escaped}';</script></body></html>"
    );
    ResponseTemplate::new(200)
        .set_body_raw(page, "text/html; charset=utf-8")
}

/// Deterministic test payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
