//! # HTTP Retrieval Utilities
//!
//! This module provides the asynchronous `FetchClient`, a thin wrapper around
//! `reqwest` that every API call in the crate goes through.
//!
//! ## Request Pipeline:
//! 1.  **URL**: base URL + path + URL-encoded query pairs.
//! 2.  **Build**: default JSON headers, per-request headers, optional body.
//! 3.  **Request hooks**: `Interceptor::on_request`, in registration order.
//! 4.  **Exchange**: send and buffer the body under a single deadline. When
//!     the deadline expires the exchange future is dropped, which cancels the
//!     in-flight request, and `FetchError::Timeout` is returned.
//! 5.  **Response hooks**: `Interceptor::on_response`, in registration order.
//! 6.  **Classify**: non-2xx becomes `FetchError::Http`, a body that is not
//!     valid JSON for `T` becomes `FetchError::Decode`.
//!
//! There is deliberately no retry layer; callers own their retry policy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, trace};

use super::error::{ClientBuildError, FetchError};
use super::interceptors::{Interceptor, ResponseParts};

/// Request deadline used when neither the client nor the request sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// # Request Config
///
/// Per-request options layered on top of the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query pairs appended (URL-encoded) in order.
    pub query: Vec<(String, String)>,
    /// Extra headers; these override the client defaults.
    pub headers: HeaderMap,
    /// Serialized JSON body.
    pub body: Option<Vec<u8>>,
    /// Deadline override for this request only.
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// An empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a query pair.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Serializes `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, FetchError> {
        let bytes = serde_json::to_vec(body).map_err(|e| FetchError::Decode(format!("failed to encode request body: {e}")))?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Overrides the deadline for this request. Zero keeps the client's.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Builder for [`FetchClient`].
pub struct FetchClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl FetchClientBuilder {
    /// Sets the default request deadline. Zero keeps [`DEFAULT_TIMEOUT`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Registers an interceptor. Interceptors run in the order they are added.
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Validates the base URL and builds the client.
    pub fn build(self) -> Result<FetchClient, ClientBuildError> {
        let base_url = normalize_base_url(&self.base_url)?;

        let mut builder = reqwest::Client::builder();
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.as_str());
        }

        Ok(FetchClient {
            inner: builder.build()?,
            base_url,
            timeout: if self.timeout.is_zero() { DEFAULT_TIMEOUT } else { self.timeout },
            interceptors: self.interceptors,
        })
    }
}

/// # Fetch Client
///
/// A typed asynchronous HTTP client bound to one API base URL.
///
/// Cloning is cheap: the connection pool and the interceptor list are shared.
#[derive(Clone)]
pub struct FetchClient {
    /// The underlying `reqwest` client (connection pool).
    inner: reqwest::Client,
    /// Base URL without a trailing slash, e.g. `http://localhost:8000/api/v1`.
    base_url: String,
    /// Default deadline per request.
    timeout: Duration,
    /// Hooks run around every request, in order.
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl FetchClient {
    /// Starts a builder for `base_url` with the default 10 s timeout.
    pub fn builder(base_url: impl Into<String>) -> FetchClientBuilder {
        FetchClientBuilder {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            interceptors: Vec::new(),
        }
    }

    /// A client with default settings and no interceptors.
    pub fn new(base_url: &str) -> Result<Self, ClientBuildError> {
        Self::builder(base_url).build()
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The default request deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `GET {base}{path}?{query}` decoded as `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, FetchError> {
        let mut config = RequestConfig::new();
        for (key, value) in query {
            config = config.query(*key, value);
        }
        self.request(Method::GET, path, config).await
    }

    /// `POST {base}{path}` with an optional JSON body, decoded as `T`.
    pub async fn post<T, B>(&self, path: &str, body: Option<&B>) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut config = RequestConfig::new();
        if let Some(body) = body {
            config = config.json(body)?;
        }
        self.request(Method::POST, path, config).await
    }

    /// Builds the absolute URL for `path` and `query`.
    pub fn compose_url(&self, path: &str, query: &[(String, String)]) -> Result<Url, FetchError> {
        let path = path.trim();
        let joined = if path.is_empty() || path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };

        let mut url = Url::parse(&joined).map_err(|e| FetchError::Network(format!("invalid request URL '{joined}': {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Performs a request and decodes the JSON body as `T`.
    ///
    /// # Errors
    /// See [`FetchError`]; the variant tells exactly which stage failed.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        config: RequestConfig,
    ) -> Result<T, FetchError> {
        let parts = self.exchange(method, path, config).await?;

        if !parts.status.is_success() {
            let body = String::from_utf8_lossy(&parts.body).trim().to_string();
            return Err(FetchError::Http {
                status: parts.status.as_u16(),
                body: if body.is_empty() { None } else { Some(body) },
            });
        }

        serde_json::from_slice::<T>(&parts.body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Sends the request and returns the buffered response after the response
    /// hooks ran, without interpreting the status.
    async fn exchange(&self, method: Method, path: &str, config: RequestConfig) -> Result<ResponseParts, FetchError> {
        // 1. Construct the full absolute URL
        let url = self.compose_url(path, &config.query)?;

        // 2. Default JSON headers, then per-request overrides and body
        let mut builder = self
            .inner
            .request(method.clone(), url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .headers(config.headers);
        if let Some(body) = config.body {
            builder = builder.body(body);
        }
        let mut request = builder.build()?;

        // 3. Request hooks
        for hook in &self.interceptors {
            hook.on_request(&mut request)?;
        }

        // 4. Send and buffer under one deadline
        let deadline = config.timeout.filter(|t| !t.is_zero()).unwrap_or(self.timeout);
        let started = Instant::now();
        let client = &self.inner;
        let exchange = async move {
            let response = client.execute(request).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let final_url = response.url().clone();
            let body = response.bytes().await?.to_vec();
            Ok::<_, FetchError>((final_url, status, headers, body))
        };

        let (final_url, status, headers, body) = match tokio::time::timeout(deadline, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(%method, path, timeout_ms = deadline.as_millis() as u64, "Request timed out");
                return Err(FetchError::Timeout(deadline));
            }
        };

        let mut parts = ResponseParts {
            method,
            url: final_url,
            status,
            headers,
            body,
            elapsed: started.elapsed(),
        };
        trace!(url = %parts.url, status = parts.status.as_u16(), "Exchange complete");

        // 5. Response hooks
        for hook in &self.interceptors {
            hook.on_response(&mut parts)?;
        }

        Ok(parts)
    }
}

/// Validates an absolute http(s) base URL and strips any trailing slash.
fn normalize_base_url(raw: &str) -> Result<String, ClientBuildError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|e| ClientBuildError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientBuildError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(ClientBuildError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "base URL must not carry a query or fragment".to_string(),
        });
    }

    Ok(trimmed.to_string())
}
