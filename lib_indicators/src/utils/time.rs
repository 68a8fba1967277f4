//! # Lenient Timestamp Parsing
//!
//! The upstream API is not consistent about time formats: some endpoints send
//! RFC 3339, others Python `isoformat()` output without an offset, and
//! historical series use bare `YYYY-MM-DD` dates. These helpers accept all of
//! them so a formatting quirk never fails a whole snapshot.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Parses an upstream timestamp. Offset-less values are taken as UTC; a bare
/// date maps to midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parses an upstream date, accepting full timestamps as well.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    parse_timestamp(raw).map(|ts| ts.date_naive())
}

/// `serde` adapter for `Option<DateTime<Utc>>` fields fed by [`parse_timestamp`].
///
/// Use together with `#[serde(default)]`. An unparseable string becomes `None`
/// rather than an error.
pub fn deserialize_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// `serde` adapter for required `NaiveDate` fields fed by [`parse_date`].
pub fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn accepts_upstream_shapes() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 28, 0, 3, 52).unwrap();
        assert_eq!(parse_timestamp("2025-06-28T00:03:52Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-06-27T21:03:52-03:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-06-28T00:03:52.123456").map(|t| t.with_nanosecond(0).unwrap()),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp("2025-06-28"),
            Some(Utc.with_ymd_and_hms(2025, 6, 28, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn dates_accept_timestamps() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 28).unwrap();
        assert_eq!(parse_date("2025-06-28"), Some(day));
        assert_eq!(parse_date("2025-06-28T10:00:00"), Some(day));
        assert_eq!(parse_date("28/06/2025"), None);
    }
}
