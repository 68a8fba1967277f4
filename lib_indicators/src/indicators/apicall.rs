//! # Indicator API Client
//!
//! The three remote endpoints of the indicator service, on top of the generic
//! `FetchClient`:
//!
//! - `GET  {base}/indicators/current`
//! - `GET  {base}/indicators/historical/{id}?days={n}`
//! - `POST {base}/indicators/refresh`
//!
//! Every response is unwrapped from its envelope here, and historical series
//! are normalized before they leave this module: stable-sorted by date and cut
//! to the trailing `days` points.
//!
//! The `IndicatorSource` trait is the seam the store is generic over, so the
//! store can run against a scripted source in tests.

use std::future::Future;

use tracing::{debug, info};
use url::form_urlencoded;

use super::model::{Envelope, HistoricalPoint, Indicator, RefreshAck};
use crate::retrieve::{FetchClient, FetchError};

/// Smallest history window the service accepts.
pub const MIN_HISTORY_DAYS: u32 = 1;
/// Largest history window the service accepts.
pub const MAX_HISTORY_DAYS: u32 = 365;

/// # Indicator Source
///
/// Anything that can produce indicator snapshots and series.
pub trait IndicatorSource: Send + Sync + 'static {
    /// The current snapshot of every indicator.
    fn current(&self) -> impl Future<Output = Result<Vec<Indicator>, FetchError>> + Send;

    /// The series of `id` over the trailing `days` days, ordered by date.
    fn historical(&self, id: &str, days: u32) -> impl Future<Output = Result<Vec<HistoricalPoint>, FetchError>> + Send;

    /// Asks the upstream service to recompute its own cache.
    fn request_refresh(&self) -> impl Future<Output = Result<RefreshAck, FetchError>> + Send;
}

/// # Indicator API
///
/// `IndicatorSource` backed by the remote HTTP service.
#[derive(Debug, Clone)]
pub struct IndicatorApi {
    client: FetchClient,
}

impl IndicatorApi {
    /// Wraps a configured client. The client's base URL must point at the API
    /// root, e.g. `http://localhost:8000/api/v1`.
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &FetchClient {
        &self.client
    }

    /// `GET /indicators/current`.
    pub async fn fetch_current(&self) -> Result<Vec<Indicator>, FetchError> {
        let envelope: Envelope<Vec<Indicator>> = self.client.get("/indicators/current", &[]).await?;
        let items = envelope.into_data()?;
        debug!(count = items.len(), "Current indicators fetched");
        Ok(items)
    }

    /// `GET /indicators/historical/{id}?days={days}`, normalized.
    ///
    /// `days` is clamped to the range the service accepts.
    pub async fn fetch_historical(&self, id: &str, days: u32) -> Result<Vec<HistoricalPoint>, FetchError> {
        let days = days.clamp(MIN_HISTORY_DAYS, MAX_HISTORY_DAYS);
        let path = format!("/indicators/historical/{}", encode_segment(id));
        let days_param = days.to_string();

        let envelope: Envelope<Vec<HistoricalPoint>> = self.client.get(&path, &[("days", &days_param)]).await?;
        let points = normalize_history(envelope.into_data()?, days);
        debug!(id, days, count = points.len(), "Historical series fetched");
        Ok(points)
    }

    /// `POST /indicators/refresh`.
    pub async fn trigger_refresh(&self) -> Result<RefreshAck, FetchError> {
        let envelope: Envelope<serde_json::Value> = self.client.post::<_, ()>("/indicators/refresh", None).await?;
        let ack = envelope.into_ack()?;
        info!(message = ack.message.as_deref().unwrap_or(""), "Upstream refresh requested");
        Ok(ack)
    }
}

impl IndicatorSource for IndicatorApi {
    fn current(&self) -> impl Future<Output = Result<Vec<Indicator>, FetchError>> + Send {
        self.fetch_current()
    }

    fn historical(&self, id: &str, days: u32) -> impl Future<Output = Result<Vec<HistoricalPoint>, FetchError>> + Send {
        self.fetch_historical(id, days)
    }

    fn request_refresh(&self) -> impl Future<Output = Result<RefreshAck, FetchError>> + Send {
        self.trigger_refresh()
    }
}

/// Stable-sorts `points` by date and keeps at most the trailing `days` points.
pub fn normalize_history(mut points: Vec<HistoricalPoint>, days: u32) -> Vec<HistoricalPoint> {
    points.sort_by_key(|p| p.date);
    let keep = days as usize;
    if points.len() > keep {
        points.drain(..points.len() - keep);
    }
    points
}

/// Percent-encodes one path segment.
fn encode_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(day: u32, value: f64) -> HistoricalPoint {
        HistoricalPoint {
            date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            value,
            source: None,
        }
    }

    #[test]
    fn normalize_sorts_and_keeps_the_tail() {
        let points = vec![point(3, 3.0), point(1, 1.0), point(2, 2.0), point(1, 1.5)];
        let out = normalize_history(points, 3);
        let days: Vec<u32> = out.iter().map(|p| chrono::Datelike::day(&p.date)).collect();
        assert_eq!(days, vec![1, 2, 3]);
        // Stable: of the two June 1st points only the later one survives the cut.
        assert_eq!(out[0].value, 1.5);

        let short = normalize_history(vec![point(2, 2.0)], 30);
        assert_eq!(short.len(), 1);
    }

    #[test]
    fn path_segments_are_encoded() {
        assert_eq!(encode_segment("riesgo_pais"), "riesgo_pais");
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
    }
}
