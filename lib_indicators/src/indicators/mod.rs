//! # Indicators
//!
//! Everything specific to the Argentine indicator service.
//!
//! - **`model`**: wire types (`Indicator`, `HistoricalPoint`, the response
//!   `Envelope`) and the `ResourceKey` the store is keyed by.
//! - **`apicall`**: the `IndicatorSource` seam and its HTTP implementation,
//!   `IndicatorApi`.
//! - **`store`**: the refreshing, coalescing `IndicatorStore`.
//! - **`series`**: summaries and sparklines over a historical series.

/// HTTP endpoints of the indicator service.
pub mod apicall;
/// Wire models.
pub mod model;
/// Summary helpers for historical series.
pub mod series;
/// Snapshot owner and refresh orchestration.
pub mod store;

pub use apicall::{normalize_history, IndicatorApi, IndicatorSource};
pub use model::{Envelope, HistoricalPoint, Indicator, Payload, RefreshAck, ResourceKey};
pub use series::{HistoryPeriod, SeriesSummary};
pub use store::{
    FetchOutcome, FetchState, IndicatorStore, ResourceSnapshot, StoreConfig, StoreEvent, TrackedSeries,
};
