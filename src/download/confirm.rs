//! Interstitial warning page handling.
//!
//! Large files the service will not virus-scan are answered with an HTML
//! warning page instead of bytes. The page embeds a confirmation token that
//! must be echoed back on a second request. The page layout changes over time,
//! so all matching on its contents lives in this module.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap};
use url::Url;

/// Hidden form input carrying the token (current page layout).
#[allow(clippy::expect_used)]
static FORM_CONFIRM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="confirm"\s+value="([0-9A-Za-z_-]+)""#)
        .expect("confirm input regex is valid") // Static pattern, safe to panic
});

/// Hidden form input carrying the per-download uuid (current page layout).
#[allow(clippy::expect_used)]
static FORM_UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="uuid"\s+value="([0-9A-Za-z_-]+)""#)
        .expect("uuid input regex is valid") // Static pattern, safe to panic
});

/// `confirm=` query parameter inside a download link (older layouts).
#[allow(clippy::expect_used)]
static LINK_CONFIRM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&;]confirm=([0-9A-Za-z_-]+)")
        .expect("confirm link regex is valid") // Static pattern, safe to panic
});

/// Token extracted from an interstitial page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationToken {
    /// Value for the `confirm` parameter.
    pub confirm: String,
    /// Value for the `uuid` parameter, when the page carries one.
    pub uuid: Option<String>,
}

impl ConfirmationToken {
    /// Returns `url` with the token parameters appended.
    #[must_use]
    pub fn apply(&self, url: &Url) -> Url {
        let mut confirmed = url.clone();
        {
            let mut pairs = confirmed.query_pairs_mut();
            pairs.append_pair("confirm", &self.confirm);
            if let Some(uuid) = &self.uuid {
                pairs.append_pair("uuid", uuid);
            }
        }
        confirmed
    }
}

/// Extracts the confirmation token from an interstitial page body.
///
/// Returns `None` when the body carries no recognizable token.
#[must_use]
pub fn extract_confirmation_token(body: &str) -> Option<ConfirmationToken> {
    let confirm = FORM_CONFIRM_RE
        .captures(body)
        .or_else(|| LINK_CONFIRM_RE.captures(body))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())?;
    let uuid = FORM_UUID_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    Some(ConfirmationToken { confirm, uuid })
}

/// Returns true if the response headers look like a warning page rather than file bytes.
///
/// File responses carry `Content-Disposition`; the warning page is plain HTML.
#[must_use]
pub(crate) fn looks_like_interstitial(headers: &HeaderMap) -> bool {
    if headers.contains_key(CONTENT_DISPOSITION) {
        return false;
    }
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
}

/// Why an HTML page without a token could not be turned into a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageRefusal {
    /// Download quota exceeded.
    Quota,
    /// Sign-in or access request page.
    Permission,
    /// Anything else.
    Unrecognized,
}

/// Classifies a tokenless HTML page.
pub(crate) fn classify_refusal(body: &str) -> PageRefusal {
    let lower = body.to_ascii_lowercase();
    if lower.contains("too many users have viewed or downloaded this file recently")
        || lower.contains("quota exceeded")
    {
        PageRefusal::Quota
    } else if lower.contains("you need access")
        || lower.contains("request access")
        || lower.contains("accounts.google.com/servicelogin")
    {
        PageRefusal::Permission
    } else {
        PageRefusal::Unrecognized
    }
}
