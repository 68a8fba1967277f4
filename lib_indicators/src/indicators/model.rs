//! # Indicator Data Model
//!
//! Strongly-typed representation of the indicator API payloads.
//!
//! ## Key Features:
//! - **Tolerant identifiers**: the indicator key may arrive as `id` or as
//!   `indicator_type`. When both are present (the backend sends a numeric row
//!   `id` next to the `indicator_type` string) the string key wins.
//! - **Tolerant timestamps**: `timestamp` or `date`, in any of the shapes
//!   accepted by `utils::time`.
//! - **Unit inference**: a payload without `unit` still formats correctly via
//!   `Unit::infer`.
//! - **Envelope unwrapping**: every response is wrapped in
//!   `{status, data, message}`; `Envelope::into_data` turns a non-success
//!   status into `FetchError::Application` even on HTTP 2xx.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::retrieve::FetchError;
use crate::utils::format::{format_value, IndicatorValue, Unit};
use crate::utils::time::{deserialize_date, deserialize_opt_timestamp};

/// # Indicator
///
/// A named scalar economic measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawIndicator")]
pub struct Indicator {
    /// Stable key, e.g. `dolar_blue` or `riesgo_pais`.
    pub id: String,
    /// Numeric magnitude or upstream placeholder.
    pub value: IndicatorValue,
    /// Display unit as sent by the API, if any. See [`Indicator::unit`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    /// Provenance label (issuing authority or data provider).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// When the value was observed or published upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Indicator {
    /// A numeric indicator with an explicit unit.
    pub fn new(id: impl Into<String>, value: f64, unit: Unit) -> Self {
        Self {
            id: id.into(),
            value: IndicatorValue::Number(value),
            unit: Some(unit),
            source: None,
            timestamp: None,
        }
    }

    /// The unit used for display: the wire unit, or one inferred from the id.
    pub fn unit(&self) -> Unit {
        self.unit.clone().unwrap_or_else(|| Unit::infer(&self.id))
    }

    /// The value formatted with its unit.
    pub fn display(&self) -> String {
        format_value(&self.value, &self.unit())
    }
}

/// Wire key of an indicator: a string key or a numeric row id.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireKey {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
struct RawIndicator {
    #[serde(default)]
    id: Option<WireKey>,
    #[serde(default)]
    indicator_type: Option<String>,
    value: IndicatorValue,
    #[serde(default)]
    unit: Option<Unit>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
    date: Option<DateTime<Utc>>,
}

impl TryFrom<RawIndicator> for Indicator {
    type Error = String;

    fn try_from(raw: RawIndicator) -> Result<Self, Self::Error> {
        let id = match (raw.indicator_type, raw.id) {
            (Some(kind), _) if !kind.trim().is_empty() => kind,
            (_, Some(WireKey::Text(id))) if !id.trim().is_empty() => id,
            (_, Some(WireKey::Number(n))) => n.to_string(),
            _ => return Err("indicator without `id` or `indicator_type`".to_string()),
        };

        Ok(Self {
            id,
            value: raw.value,
            unit: raw.unit,
            source: raw.source,
            timestamp: raw.timestamp.or(raw.date),
        })
    }
}

/// # Historical Point
///
/// One dated value of an indicator's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    /// Observation date.
    #[serde(alias = "timestamp", deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    /// Value on that date.
    pub value: f64,
    /// Provenance label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Acknowledgement of `POST /indicators/refresh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshAck {
    /// Human-readable message from the server.
    pub message: Option<String>,
    /// Server time of the acknowledgement.
    pub timestamp: Option<DateTime<Utc>>,
}

/// # Envelope
///
/// The `{status, data, message}` wrapper around every API payload. Extra
/// top-level fields (`indicator`, `period`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// `"success"` or `"error"`.
    #[serde(default)]
    pub status: Option<String>,
    /// The payload.
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    /// Error or informational message.
    #[serde(default)]
    pub message: Option<String>,
    /// Server time of the response.
    #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Number of items in `data`, when the server reports it.
    #[serde(default)]
    pub count: Option<u64>,
}

impl<T> Envelope<T> {
    fn check_status(&self) -> Result<(), FetchError> {
        match self.status.as_deref() {
            Some("success") => Ok(()),
            Some(other) => Err(FetchError::Application(
                self.message.clone().unwrap_or_else(|| format!("status '{other}'")),
            )),
            None => Err(FetchError::Application(
                self.message.clone().unwrap_or_else(|| "missing status".to_string()),
            )),
        }
    }

    /// Returns `data`, or the application error the envelope reports.
    pub fn into_data(self) -> Result<T, FetchError> {
        self.check_status()?;
        self.data.ok_or_else(|| FetchError::Decode("success envelope without `data`".to_string()))
    }

    /// Returns the acknowledgement carried by a data-less envelope.
    pub fn into_ack(self) -> Result<RefreshAck, FetchError> {
        self.check_status()?;
        Ok(RefreshAck {
            message: self.message,
            timestamp: self.timestamp,
        })
    }
}

/// # Resource Key
///
/// What a store entry refers to: the whole current snapshot, or the series
/// of one indicator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    /// The current snapshot of all indicators.
    Current,
    /// The historical series of one indicator id.
    Historical(String),
}

impl ResourceKey {
    /// Shorthand for `ResourceKey::Historical(id.into())`.
    pub fn historical(id: impl Into<String>) -> Self {
        ResourceKey::Historical(id.into())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Current => f.write_str("current"),
            ResourceKey::Historical(id) => write!(f, "historical:{id}"),
        }
    }
}

/// The data produced by one successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A full current snapshot.
    Current(Arc<Vec<Indicator>>),
    /// One normalized historical series.
    Historical(Arc<Vec<HistoricalPoint>>),
}

impl Payload {
    /// Number of items carried.
    pub fn len(&self) -> usize {
        match self {
            Payload::Current(items) => items.len(),
            Payload::Historical(points) => points.len(),
        }
    }

    /// `true` when the payload carries nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_indicator_shapes() {
        let plain: Indicator = serde_json::from_value(json!({
            "id": "dolar_blue", "value": 1047, "unit": "ars", "source": "demo"
        }))
        .unwrap();
        assert_eq!(plain.id, "dolar_blue");
        assert_eq!(plain.value, IndicatorValue::Number(1047.0));
        assert_eq!(plain.unit(), Unit::Ars);
        assert_eq!(plain.display(), "$1,047");

        let backend: Indicator = serde_json::from_value(json!({
            "id": 12, "indicator_type": "inflacion_mensual", "value": 4.2,
            "date": "2025-06-28T00:03:52.123", "source": "INDEC", "is_active": true
        }))
        .unwrap();
        assert_eq!(backend.id, "inflacion_mensual");
        assert_eq!(backend.unit, None);
        assert_eq!(backend.display(), "4.2%");
        assert!(backend.timestamp.is_some());

        let placeholder: Indicator = serde_json::from_value(json!({
            "id": "reservas", "value": "N/D", "unit": "usd_billions"
        }))
        .unwrap();
        assert_eq!(placeholder.display(), "N/D");

        assert!(serde_json::from_value::<Indicator>(json!({"value": 1})).is_err());
    }

    #[test]
    fn envelope_status_is_authoritative() {
        let ok: Envelope<Vec<Indicator>> = serde_json::from_value(json!({
            "status": "success", "data": [], "count": 0
        }))
        .unwrap();
        assert_eq!(ok.into_data().unwrap(), Vec::<Indicator>::new());

        let failed: Envelope<Vec<Indicator>> =
            serde_json::from_value(json!({"status": "error", "message": "upstream down"})).unwrap();
        assert_eq!(failed.into_data(), Err(FetchError::Application("upstream down".to_string())));

        let empty: Envelope<Vec<Indicator>> = serde_json::from_value(json!({"status": "success"})).unwrap();
        assert_eq!(empty.into_data().unwrap_err().kind(), "decode");
    }

    #[test]
    fn refresh_ack_reads_message() {
        let env: Envelope<serde_json::Value> = serde_json::from_value(json!({
            "message": "Indicators refresh initiated",
            "timestamp": "2025-06-28T00:03:52",
            "status": "success"
        }))
        .unwrap();
        let ack = env.into_ack().unwrap();
        assert_eq!(ack.message.as_deref(), Some("Indicators refresh initiated"));
        assert!(ack.timestamp.is_some());
    }

    #[test]
    fn historical_point_accepts_dates_and_timestamps() {
        let p: HistoricalPoint =
            serde_json::from_value(json!({"date": "2025-06-01", "value": 1180.0, "source": "BCRA"})).unwrap();
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        let p: HistoricalPoint =
            serde_json::from_value(json!({"timestamp": "2025-06-01T12:00:00Z", "value": 1.0})).unwrap();
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }

    #[test]
    fn resource_keys_display() {
        assert_eq!(ResourceKey::Current.to_string(), "current");
        assert_eq!(ResourceKey::historical("riesgo_pais").to_string(), "historical:riesgo_pais");
    }
}
