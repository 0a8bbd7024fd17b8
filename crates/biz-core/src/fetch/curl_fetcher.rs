//! libcurl-backed fetcher.

use super::{validate_url, FetchError, FetchOptions, Fetched, Fetcher};

/// Fetches with a fresh curl Easy handle per request.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    opts: FetchOptions,
}

impl CurlFetcher {
    pub fn new(opts: FetchOptions) -> Self {
        Self { opts }
    }
}

impl Fetcher for CurlFetcher {
    /// Performs a single GET (following redirects) and buffers the body.
    /// Runs in the current thread; call from `spawn_blocking` if used from async code.
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let parsed = validate_url(url)?;
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(parsed.as_str()).map_err(FetchError::transport)?;
        easy.get(true).map_err(FetchError::transport)?;
        easy.follow_location(true).map_err(FetchError::transport)?;
        easy.max_redirections(self.opts.max_redirections)
            .map_err(FetchError::transport)?;
        easy.connect_timeout(self.opts.connect_timeout)
            .map_err(FetchError::transport)?;
        easy.timeout(self.opts.timeout)
            .map_err(FetchError::transport)?;
        if let Some(ua) = &self.opts.user_agent {
            easy.useragent(ua).map_err(FetchError::transport)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(FetchError::transport)?;
            transfer.perform().map_err(FetchError::transport)?;
        }

        let code = easy.response_code().map_err(FetchError::transport)?;
        if !(200..300).contains(&code) {
            return Err(FetchError::BadStatus(code));
        }

        let declared = easy.content_length_download().unwrap_or(-1.0);
        let content_length = if declared >= 0.0 {
            Some(declared as u64)
        } else {
            None
        };
        if let Some(expected) = content_length {
            if expected != body.len() as u64 {
                tracing::debug!(
                    url,
                    expected,
                    received = body.len(),
                    "body length differs from Content-Length"
                );
            }
        }

        Ok(Fetched {
            bytes: body,
            content_length,
        })
    }
}
