//! Image fetcher: one HTTP GET per URL, whole body in memory.
//!
//! The pipeline only depends on the [`Fetcher`] trait; [`CurlFetcher`] is the
//! production implementation on top of libcurl. No retries: a URL gets exactly
//! one attempt per run.

mod curl_fetcher;
mod error;

pub use curl_fetcher::CurlFetcher;
pub use error::{classify_curl_error, FetchError, TransportKind};

use std::time::Duration;

/// Raw bytes of one successful fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    /// `Content-Length` declared by the server, if any.
    pub content_length: Option<u64>,
}

/// Trait implemented by anything that can turn a URL into bytes.
///
/// Implementations are called from blocking worker threads, so they may block.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// Timeouts and request knobs for [`CurlFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_redirections: u32,
    pub user_agent: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(60),
            max_redirections: 10,
            user_agent: None,
        }
    }
}

/// Accept only absolute http(s) URLs; anything else never reaches the network.
pub fn validate_url(raw: &str) -> Result<url::Url, FetchError> {
    let parsed = url::Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
