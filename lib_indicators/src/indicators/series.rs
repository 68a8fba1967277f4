//! Summary statistics over one historical series.

use chrono::NaiveDate;

use super::model::HistoricalPoint;
use crate::utils::format::{format_change, ChangeDisplay};
use crate::utils::sparkline::{Sparkline, Trend};

/// # Series Summary
///
/// First/last/min/max of a series plus its overall change.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    /// Date of the first point.
    pub start: NaiveDate,
    /// Date of the last point.
    pub end: NaiveDate,
    /// First value.
    pub first: f64,
    /// Last value.
    pub last: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// `(last - first) / first * 100`, or `None` when `first` is zero.
    pub change_pct: Option<f64>,
    /// Direction from first to last.
    pub trend: Trend,
}

impl SeriesSummary {
    /// Summarizes date-ordered `points`. `None` for an empty series.
    pub fn from_points(points: &[HistoricalPoint]) -> Option<Self> {
        let (head, tail) = (points.first()?, points.last()?);
        let values = values(points);

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let change_pct = (head.value != 0.0).then(|| (tail.value - head.value) / head.value * 100.0);

        Some(Self {
            start: head.date,
            end: tail.date,
            first: head.value,
            last: tail.value,
            min,
            max,
            change_pct,
            trend: Trend::of(&values),
        })
    }

    /// The change formatted for display, e.g. `+1.5%`.
    pub fn change_display(&self) -> Option<ChangeDisplay> {
        self.change_pct.map(format_change)
    }
}

/// The values of `points`, in order.
pub fn values(points: &[HistoricalPoint]) -> Vec<f64> {
    points.iter().map(|p| p.value).collect()
}

/// Projects `points` into a `width` x `height` sparkline.
pub fn sparkline(points: &[HistoricalPoint], width: f64, height: f64) -> Sparkline {
    Sparkline::project(&values(points), width, height)
}

/// # History Period
///
/// Chart range presets and the history window each one requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HistoryPeriod {
    /// `1D`
    OneDay,
    /// `1W`
    OneWeek,
    /// `1M`
    OneMonth,
    /// `3M`
    ThreeMonths,
    /// `6M`
    SixMonths,
    /// `1Y`
    #[default]
    OneYear,
    /// `MAX`. Two years are requested; the API clamps the window to
    /// `MAX_HISTORY_DAYS`.
    Max,
}

impl HistoryPeriod {
    /// Parses a preset label. Unknown labels fall back to one year.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "1D" => HistoryPeriod::OneDay,
            "1W" => HistoryPeriod::OneWeek,
            "1M" => HistoryPeriod::OneMonth,
            "3M" => HistoryPeriod::ThreeMonths,
            "6M" => HistoryPeriod::SixMonths,
            "MAX" => HistoryPeriod::Max,
            _ => HistoryPeriod::OneYear,
        }
    }

    /// The preset label.
    pub fn label(&self) -> &'static str {
        match self {
            HistoryPeriod::OneDay => "1D",
            HistoryPeriod::OneWeek => "1W",
            HistoryPeriod::OneMonth => "1M",
            HistoryPeriod::ThreeMonths => "3M",
            HistoryPeriod::SixMonths => "6M",
            HistoryPeriod::OneYear => "1Y",
            HistoryPeriod::Max => "MAX",
        }
    }

    /// History window in days, for `track_historical`.
    pub fn days(&self) -> u32 {
        match self {
            HistoryPeriod::OneDay => 1,
            HistoryPeriod::OneWeek => 7,
            HistoryPeriod::OneMonth => 30,
            HistoryPeriod::ThreeMonths => 90,
            HistoryPeriod::SixMonths => 180,
            HistoryPeriod::OneYear => 365,
            HistoryPeriod::Max => 730,
        }
    }
}
