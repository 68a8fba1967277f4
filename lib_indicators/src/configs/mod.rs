//! # API Settings
//!
//! Resolves which deployment of the indicator API to talk to and turns the
//! result into a ready `IndicatorApi`.
//!
//! The only environment-driven setting is the base URL, read from
//! `INDICATORS_API_BASE` after loading a `.env` file if one exists.

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::indicators::{IndicatorApi, IndicatorStore, StoreConfig};
use crate::retrieve::{ClientBuildError, FetchClient, LoggingInterceptor, DEFAULT_TIMEOUT};

/// Environment variable holding the API base URL.
pub const API_BASE_ENV: &str = "INDICATORS_API_BASE";
/// Base URL used when the environment does not provide one.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/v1";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base URL or client options were rejected.
    #[error(transparent)]
    Client(#[from] ClientBuildError),
}

/// # API Settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    /// API root, e.g. `http://localhost:8000/api/v1`.
    pub base_url: String,
    /// Per-request deadline.
    pub timeout: Duration,
    /// Whether to attach the `tracing` request/response interceptor.
    pub log_requests: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            log_requests: true,
        }
    }
}

impl ApiSettings {
    /// Settings for an explicit base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Reads `.env` (if present) and then `INDICATORS_API_BASE`.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but with a custom variable lookup.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(API_BASE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::with_base_url(base_url)
    }

    /// Builds the fetch client.
    pub fn client(&self) -> Result<FetchClient, ConfigError> {
        let mut builder = FetchClient::builder(&self.base_url).timeout(self.timeout);
        if self.log_requests {
            builder = builder.interceptor(LoggingInterceptor);
        }
        Ok(builder.build()?)
    }

    /// Builds the API wrapper.
    pub fn api(&self) -> Result<IndicatorApi, ConfigError> {
        Ok(IndicatorApi::new(self.client()?))
    }

    /// Builds a store over the API.
    pub fn store(&self, config: StoreConfig) -> Result<IndicatorStore, ConfigError> {
        Ok(IndicatorStore::new(self.api()?, config))
    }
}
