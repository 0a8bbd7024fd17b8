//! Fetch error type and curl error classification.

use thiserror::Error;

/// Why a transport-level failure happened; used for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Connect or total timeout elapsed.
    Timeout,
    /// DNS, refused connection, reset, empty reply.
    Connection,
    /// Anything else curl reports.
    Other,
}

/// Error returned by a single fetch. Never fatal for the batch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or uses a scheme other than http(s).
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Curl reported an error before a complete response arrived.
    #[error("transport error ({kind:?}): {source}")]
    Transport {
        kind: TransportKind,
        #[source]
        source: curl::Error,
    },

    /// Response arrived with a non-2xx status.
    #[error("HTTP {0}")]
    BadStatus(u32),
}

impl FetchError {
    pub fn transport(source: curl::Error) -> Self {
        FetchError::Transport {
            kind: classify_curl_error(&source),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FetchError::Transport {
                kind: TransportKind::Timeout,
                ..
            }
        )
    }
}

/// Classify a curl error for logging.
pub fn classify_curl_error(e: &curl::Error) -> TransportKind {
    if e.is_operation_timedout() {
        return TransportKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return TransportKind::Connection;
    }
    TransportKind::Other
}
