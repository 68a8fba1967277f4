//! # lib_indicators
//!
//! Data access layer for Argentine economic indicators (exchange rates,
//! inflation, central-bank reserves, country risk, stock indices).
//!
//! The crate is split by folder, and every folder except `utils` sits behind
//! a cargo feature of the same name (see `Cargo.toml`). Enable `full` to get
//! everything.
//!
//! - **`utils`**: pure helpers. Value formatting, freshness classification,
//!   sparkline/trend projection and lenient timestamp parsing.
//! - **`retrieve`**: the typed HTTP fetch client with timeouts and interceptors.
//! - **`engine`**: in-flight request coalescing, subscriber fan-out and
//!   cancellable refresh schedules.
//! - **`indicators`**: wire models, the remote API wrapper and the
//!   `IndicatorStore`.
//! - **`loggers`**: `tracing` subscriber setup.
//! - **`configs`**: environment-driven settings.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod utils;

#[cfg(feature = "retrieve")]
pub mod retrieve;

#[cfg(feature = "indicators")]
pub mod engine;

#[cfg(feature = "indicators")]
pub mod indicators;

#[cfg(feature = "loggers")]
pub mod loggers;

#[cfg(feature = "configs")]
pub mod configs;

// Re-export the pieces most callers need.
pub use utils::format::{format_number, format_value, IndicatorValue, Unit};
pub use utils::freshness::{Freshness, FreshnessThresholds};

#[cfg(feature = "retrieve")]
pub use retrieve::{FetchClient, FetchError};

#[cfg(feature = "indicators")]
pub use indicators::{HistoricalPoint, Indicator, IndicatorApi, IndicatorStore, ResourceKey, StoreConfig};
