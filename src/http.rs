//! Shared HTTP helpers for the upstream clients.
use reqwest::Url;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the `reqwest` client used by every upstream integration.
///
/// No overall request timeout is set because the log stream is long-lived.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("machine-builder/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
}

/// Appends percent-encoded path segments to `base`.
///
/// A trailing slash on the base url is ignored, so both
/// `https://host/api` and `https://host/api/` produce `https://host/api/<segments>`.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, String> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| format!("'{}' cannot be used as a base url", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
