//! # Value Formatting
//!
//! Maps a raw indicator value and its unit tag to the string shown on cards
//! and tickers. Number grouping follows en-US conventions (`1,047.5`), which
//! is what the web front end rendered through `toLocaleString()`.
//!
//! Every function here is pure and total: an unknown unit tag falls back to a
//! plain grouped number, a placeholder string passes through untouched, and a
//! non-finite number prints with Rust's float display instead of failing.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::sparkline::Trend;

/// Argentina has no DST; local time is fixed at UTC-3.
const ARGENTINA_OFFSET_SECS: i32 = 3 * 3600;

/// Maximum fraction digits kept by grouped renderings.
const GROUPED_MAX_FRACTION: usize = 3;

/// # Unit
///
/// Semantic tag controlling how a value is rendered. Tags arrive as plain
/// strings on the wire; anything unrecognized is preserved in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unit {
    /// `percentage` or `%`: one decimal and a percent sign.
    Percentage,
    /// `ars`: Argentine pesos with a `$` prefix.
    Ars,
    /// `usd`: US dollars with a `US$` prefix.
    Usd,
    /// `ars_billions`: pesos scaled to billions.
    ArsBillions,
    /// `usd_billions`: dollars scaled to billions.
    UsdBillions,
    /// `usd_millions`: dollars scaled to millions.
    UsdMillions,
    /// `thousands`: value scaled to thousands with a `K` suffix.
    Thousands,
    /// `index`: one decimal, no prefix.
    Index,
    /// `count`: grouped integer-style rendering.
    Count,
    /// Any other tag; rendered like `Count`.
    Other(String),
}

impl Unit {
    /// Parses a wire tag. Never fails.
    pub fn parse(tag: &str) -> Self {
        match tag.trim() {
            "percentage" | "%" => Unit::Percentage,
            "ars" => Unit::Ars,
            "usd" => Unit::Usd,
            "ars_billions" => Unit::ArsBillions,
            "usd_billions" => Unit::UsdBillions,
            "usd_millions" => Unit::UsdMillions,
            "thousands" => Unit::Thousands,
            "index" => Unit::Index,
            "count" => Unit::Count,
            other => Unit::Other(other.to_string()),
        }
    }

    /// The canonical wire tag for this unit.
    pub fn as_tag(&self) -> &str {
        match self {
            Unit::Percentage => "percentage",
            Unit::Ars => "ars",
            Unit::Usd => "usd",
            Unit::ArsBillions => "ars_billions",
            Unit::UsdBillions => "usd_billions",
            Unit::UsdMillions => "usd_millions",
            Unit::Thousands => "thousands",
            Unit::Index => "index",
            Unit::Count => "count",
            Unit::Other(tag) => tag,
        }
    }

    /// Unit for an indicator id when the upstream payload does not carry one.
    ///
    /// The live backend sends `indicator_type` without a unit, so the display
    /// unit has to come from the id family.
    pub fn infer(indicator_id: &str) -> Self {
        let id = indicator_id.to_ascii_lowercase();
        if id.starts_with("dolar_") {
            Unit::Ars
        } else if id.starts_with("inflacion") || id.starts_with("tasa_") {
            Unit::Percentage
        } else if id == "merval" {
            Unit::Index
        } else {
            Unit::Count
        }
    }
}

impl From<String> for Unit {
    fn from(tag: String) -> Self {
        Unit::parse(&tag)
    }
}

impl From<&str> for Unit {
    fn from(tag: &str) -> Self {
        Unit::parse(tag)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.as_tag().to_string()
    }
}

/// # Indicator Value
///
/// Either a number or a placeholder string the upstream sends when it has no
/// data (e.g. `"N/D"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorValue {
    /// A numeric magnitude.
    Number(f64),
    /// An already-formatted placeholder, displayed as is.
    Placeholder(String),
}

impl IndicatorValue {
    /// The numeric magnitude, if there is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IndicatorValue::Number(v) => Some(*v),
            IndicatorValue::Placeholder(_) => None,
        }
    }
}

impl From<f64> for IndicatorValue {
    fn from(v: f64) -> Self {
        IndicatorValue::Number(v)
    }
}

/// Formats an indicator value for display. Placeholders pass through unchanged.
pub fn format_value(value: &IndicatorValue, unit: &Unit) -> String {
    match value {
        IndicatorValue::Number(v) => format_number(*v, unit),
        IndicatorValue::Placeholder(text) => text.clone(),
    }
}

/// Formats a number according to its unit.
pub fn format_number(value: f64, unit: &Unit) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    match unit {
        Unit::Percentage => format!("{value:.1}%"),
        Unit::Ars => format!("${}", group_thousands(value, GROUPED_MAX_FRACTION)),
        Unit::Usd => format!("US${}", group_thousands(value, GROUPED_MAX_FRACTION)),
        Unit::ArsBillions => format!("${:.1}B", value / 1e9),
        Unit::UsdBillions => format!("US${:.1}B", value / 1e9),
        Unit::UsdMillions => format!("US${:.1}M", value / 1e6),
        Unit::Thousands => format!("{:.1}K", value / 1000.0),
        Unit::Index => format!("{value:.1}"),
        Unit::Count | Unit::Other(_) => group_thousands(value, GROUPED_MAX_FRACTION),
    }
}

/// Renders `value` with `,` thousands separators and at most `max_fraction`
/// fraction digits, trailing zeros trimmed.
fn group_thousands(value: f64, max_fraction: usize) -> String {
    let rendered = format!("{:.*}", max_fraction, value.abs());
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((int_part, frac)) => (int_part, frac.trim_end_matches('0')),
        None => (rendered.as_str(), ""),
    };

    let mut out = String::with_capacity(rendered.len() + int_part.len() / 3 + 1);
    let digits = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }

    // Values that round to zero lose their sign.
    let is_zero = out.chars().all(|c| matches!(c, '0' | ',' | '.'));
    if value < 0.0 && !is_zero {
        out.insert(0, '-');
    }
    out
}

/// # Change Display
///
/// A signed percentage change ready for a card footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDisplay {
    /// `+1.5%`, `-0.3%` or `0%`.
    pub text: String,
    /// Direction of the change.
    pub trend: Trend,
}

/// Formats a percentage change with an explicit sign.
pub fn format_change(change_pct: f64) -> ChangeDisplay {
    if change_pct == 0.0 || !change_pct.is_finite() {
        return ChangeDisplay {
            text: "0%".to_string(),
            trend: Trend::Flat,
        };
    }

    if change_pct > 0.0 {
        ChangeDisplay {
            text: format!("+{change_pct:.1}%"),
            trend: Trend::Up,
        }
    } else {
        ChangeDisplay {
            text: format!("{change_pct:.1}%"),
            trend: Trend::Down,
        }
    }
}

/// Wall-clock time of `ts` in Argentina, `HH:MM:SS`.
pub fn format_time_of_day(ts: DateTime<Utc>) -> String {
    let offset = FixedOffset::west_opt(ARGENTINA_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    ts.with_timezone(&offset).format("%H:%M:%S").to_string()
}

/// Relative age of `ts` in the Spanish wording used across the site.
pub fn time_ago(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - ts).num_hours();
    let days = hours / 24;

    if hours < 1 {
        return "Hace menos de 1 hora".to_string();
    }
    if hours < 24 {
        let plural = if hours > 1 { "s" } else { "" };
        return format!("Hace {hours} hora{plural}");
    }
    if days < 7 {
        let plural = if days > 1 { "s" } else { "" };
        return format!("Hace {days} día{plural}");
    }

    let weeks = days / 7;
    let plural = if weeks > 1 { "s" } else { "" };
    format!("Hace {weeks} semana{plural}")
}
