//! Shared User-Agent string for download and listing requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/drivedl";

/// Default User-Agent for all requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("drivedl/{version} (+{PROJECT_UA_URL})")
}
