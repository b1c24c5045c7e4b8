//! Request failure taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`ApiClient`](crate::http::ApiClient).
///
/// [`FetchError::Http`] means the server answered with a non-success
/// status. Every other variant means no usable response arrived.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server responded with a status outside 200-299.
    #[error("HTTP {status}")]
    Http { status: u16, status_text: String },

    /// The attempt did not finish before its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or protocol failure before a response was received.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// A success response whose body is not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The endpoint could not be turned into a URL.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    /// HTTP status for [`FetchError::Http`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server answered with an error status.
    pub fn is_http(&self) -> bool {
        matches!(self, FetchError::Http { .. })
    }

    /// No response was received (deadline or connection failure).
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::Transport(_))
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Http { .. } => "http_error",
            FetchError::Timeout(_) => "timeout",
            FetchError::Transport(_) => "transport",
            FetchError::Decode(_) => "decode",
            FetchError::InvalidUrl { .. } => "invalid_url",
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        FetchError::Http {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(Box::new(e))
        } else {
            FetchError::Transport(e)
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(Box::new(e))
    }
}

/// Result type for request operations.
pub type FetchResult<T> = Result<T, FetchError>;
