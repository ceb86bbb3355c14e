//! HTTP client construction for a download session.

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::header::RANGE;
use reqwest::{Client, Proxy, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::DownloadError;
use super::session::SessionOptions;
use crate::user_agent;

/// Builds the request context for one session: cookie jar, proxy, TLS toggle, timeouts.
///
/// # Errors
///
/// Returns [`DownloadError::Client`] if the proxy URL is malformed or the
/// client cannot be built.
#[instrument(level = "debug", skip_all, fields(proxy = ?options.proxy, verify_tls = options.verify_tls))]
pub(crate) fn build_client(options: &SessionOptions) -> Result<Client, DownloadError> {
    let mut builder = Client::builder()
        .connect_timeout(options.connect_timeout)
        .read_timeout(options.read_timeout)
        .gzip(true)
        .user_agent(user_agent::default_download_user_agent());

    if options.use_cookies {
        builder = builder.cookie_provider(Arc::new(Jar::default()));
    }

    if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        debug!(proxy = %proxy, "routing requests through proxy");
        let proxy = Proxy::all(proxy.trim()).map_err(|source| DownloadError::Client { source })?;
        builder = builder.proxy(proxy);
    }

    if !options.verify_tls {
        warn!("TLS certificate verification disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|source| DownloadError::Client { source })
}

/// Request helper bound to one session's client and the id being resolved.
///
/// Maps HTTP failures onto the [`DownloadError`] taxonomy so every request
/// in a session reports errors the same way.
pub(crate) struct Fetcher<'a> {
    client: &'a Client,
    id: &'a str,
    via_proxy: bool,
}

impl<'a> Fetcher<'a> {
    pub(crate) fn new(client: &'a Client, id: &'a str, via_proxy: bool) -> Self {
        Self {
            client,
            id,
            via_proxy,
        }
    }

    /// Sends a GET, optionally ranged from `range_from`.
    ///
    /// A 416 answer to a ranged request is returned as-is for the caller to inspect.
    pub(crate) async fn get(
        &self,
        url: &Url,
        range_from: Option<u64>,
    ) -> Result<Response, DownloadError> {
        let mut request = self.client.get(url.clone());
        if let Some(start) = range_from {
            request = request.header(RANGE, format!("bytes={start}-"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport(url, e))?;

        let status = response.status();
        if status.is_success()
            || (range_from.is_some() && status == StatusCode::RANGE_NOT_SATISFIABLE)
        {
            return Ok(response);
        }

        debug!(status = status.as_u16(), url = %url, "request failed");
        Err(match status.as_u16() {
            404 => DownloadError::not_shared(self.id, "not found (HTTP 404)"),
            code @ (401 | 403) => {
                DownloadError::not_shared(self.id, format!("permission denied (HTTP {code})"))
            }
            429 => DownloadError::throttled(self.id, "too many requests (HTTP 429)"),
            code => DownloadError::resolution(self.id, format!("HTTP {code}")),
        })
    }

    /// Sends a GET and decodes a JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, DownloadError> {
        let response = self.get(url, None).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport(url, e))?;
        serde_json::from_slice(&body).map_err(|e| {
            DownloadError::resolution(self.id, format!("malformed service response: {e}"))
        })
    }

    /// Timeouts surface as resolution errors; everything else is transport.
    pub(crate) fn map_transport(&self, url: &Url, error: reqwest::Error) -> DownloadError {
        if error.is_timeout() {
            DownloadError::timeout(self.id)
        } else {
            DownloadError::transport(url.as_str(), error, self.via_proxy)
        }
    }
}
