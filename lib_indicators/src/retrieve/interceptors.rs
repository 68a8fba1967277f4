//! # Request and Response Interceptors
//!
//! Interceptors carry cross-cutting concerns (logging, auth headers, header
//! rewriting) without touching call sites. A `FetchClient` runs its
//! interceptors in registration order:
//!
//! 1. `on_request` for each hook, after the request is built and before it is
//!    sent. A hook may rewrite the method, URL, headers or body, or reject the
//!    request by returning an error.
//! 2. `on_response` for each hook, after the full body has been buffered and
//!    before the status check and JSON decoding. A hook may inspect or rewrite
//!    status, headers and body.
//!
//! Whatever the hooks do, the client still returns `Result<T, FetchError>`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, StatusCode, Url};
use tracing::{debug, warn};

use super::error::FetchError;

/// # Response Parts
///
/// A fully buffered response as seen by `on_response` hooks.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    /// Method of the originating request.
    pub method: Method,
    /// Final URL (after redirects).
    pub url: Url,
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Time from send to end of body.
    pub elapsed: Duration,
}

/// A hook pair run around every request of a `FetchClient`.
///
/// Both methods default to no-ops so an interceptor only implements the side
/// it cares about.
pub trait Interceptor: Send + Sync {
    /// Called before the request is sent.
    fn on_request(&self, _request: &mut Request) -> Result<(), FetchError> {
        Ok(())
    }

    /// Called once the response body is buffered.
    fn on_response(&self, _response: &mut ResponseParts) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Logs every exchange through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

impl Interceptor for LoggingInterceptor {
    fn on_request(&self, request: &mut Request) -> Result<(), FetchError> {
        debug!(method = %request.method(), url = %request.url(), "Sending request");
        Ok(())
    }

    fn on_response(&self, response: &mut ResponseParts) -> Result<(), FetchError> {
        let elapsed_ms = response.elapsed.as_millis() as u64;
        if response.status.is_success() {
            debug!(
                method = %response.method,
                url = %response.url,
                status = response.status.as_u16(),
                elapsed_ms,
                bytes = response.body.len(),
                "Response received"
            );
        } else {
            warn!(
                method = %response.method,
                url = %response.url,
                status = response.status.as_u16(),
                elapsed_ms,
                "Non-success response"
            );
        }
        Ok(())
    }
}

/// Injects `Authorization: Bearer <token>` into every request.
#[derive(Clone)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    /// Wraps a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth").field("token", &"***").finish()
    }
}

impl Interceptor for BearerAuth {
    fn on_request(&self, request: &mut Request) -> Result<(), FetchError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| FetchError::Network(format!("invalid auth token: {e}")))?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}
