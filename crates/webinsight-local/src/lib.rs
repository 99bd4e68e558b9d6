use std::time::Duration;
use webinsight_core::{Error, Result};

pub mod aggregate;
pub mod extract;
pub mod progress;
pub mod search;
pub mod summarize;

/// Default total deadline for one page fetch. Request-level, so hitting it
/// actually aborts the in-flight call.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Some servers reject obviously non-browser clients; present a mainstream
/// browser identity for page fetches.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Client used for provider/model API calls (search, summarization).
pub fn api_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("webinsight/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| Error::Internal(e.to_string()))
}

/// Client used for page fetches: browser identity, bounded redirects, and a
/// hard default timeout so a stalled server cannot hang a branch.
pub fn page_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Internal(e.to_string()))
}

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
