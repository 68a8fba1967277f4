use std::time::Duration;

use thiserror::Error;

/// # Fetch Error
///
/// Every way a single request can fail. All variants are terminal for the
/// request that produced them; nothing in this crate retries automatically.
///
/// The type is `Clone` so one result can be handed to every caller that
/// joined a coalesced fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No response was received (DNS failure, connection refused, aborted).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP error: status {status}")]
    Http {
        /// Numeric HTTP status code.
        status: u16,
        /// Raw response body, if it was readable and not empty.
        body: Option<String>,
    },

    /// A 2xx response whose body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The client-side deadline expired and the request was cancelled.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The API envelope reported `status: "error"` on an otherwise valid response.
    #[error("application error: {0}")]
    Application(String),
}

impl FetchError {
    /// Short, stable name for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Http { .. } => "http",
            FetchError::Decode(_) => "decode",
            FetchError::Timeout(_) => "timeout",
            FetchError::Application(_) => "application",
        }
    }

    /// The HTTP status, for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Errors raised while building a [`FetchClient`](super::FetchClient).
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The base URL is not an absolute http(s) URL.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The underlying `reqwest` client could not be created.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
