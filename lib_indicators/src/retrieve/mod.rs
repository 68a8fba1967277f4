//! # Data Retrieval Module
//!
//! This module is the single point of outbound communication with the remote
//! indicator API. It offers one consistent way to fetch data, encapsulating
//! URL composition, request timeouts, cross-cutting interceptors and error
//! classification, so the rest of the crate only deals with typed values.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: the generic `FetchClient` built on `reqwest`. Typed
//!   `get`/`post`, base URL + path + encoded query, a hard timeout per
//!   request, and no retries: a failure goes straight back to the caller.
//! - **`interceptors`**: the `Interceptor` trait and the built-in logging and
//!   auth interceptors.
//! - **`error`**: the `FetchError` taxonomy.

/// Fetch error taxonomy.
pub mod error;
/// Request/response hooks.
pub mod interceptors;
/// Generic HTTP fetch client with timeouts and interceptors.
pub mod ky_http;

pub use error::{ClientBuildError, FetchError};
pub use interceptors::{BearerAuth, Interceptor, LoggingInterceptor, ResponseParts};
pub use ky_http::{FetchClient, FetchClientBuilder, RequestConfig, DEFAULT_TIMEOUT};
