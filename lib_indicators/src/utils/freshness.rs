//! # Freshness Classification
//!
//! Classifies how old the last successful fetch is. Freshness is always
//! derived from `now - last_updated`; it is never stored, so it degrades on
//! its own while refreshes keep failing.

use chrono::{DateTime, Duration, Utc};

/// # Freshness Thresholds
///
/// Age limits for each category. An age below `fresh` is fresh, below
/// `recent` is recent, anything older is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessThresholds {
    /// Upper bound (exclusive) for `Freshness::Fresh`.
    pub fresh: Duration,
    /// Upper bound (exclusive) for `Freshness::Recent`.
    pub recent: Duration,
}

impl Default for FreshnessThresholds {
    /// 5 minutes fresh, 30 minutes recent.
    fn default() -> Self {
        Self {
            fresh: Duration::minutes(5),
            recent: Duration::minutes(30),
        }
    }
}

/// How old the data behind a view is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Freshness {
    /// Younger than the fresh threshold.
    Fresh,
    /// Between the fresh and recent thresholds.
    Recent,
    /// At or beyond the recent threshold.
    Stale,
}

impl Freshness {
    /// Classifies `last_updated` as seen from `now`.
    ///
    /// A timestamp in the future (clock skew) counts as fresh.
    pub fn classify(
        last_updated: DateTime<Utc>,
        now: DateTime<Utc>,
        thresholds: &FreshnessThresholds,
    ) -> Self {
        let age = now - last_updated;
        if age < thresholds.fresh {
            Freshness::Fresh
        } else if age < thresholds.recent {
            Freshness::Recent
        } else {
            Freshness::Stale
        }
    }

    /// Status text shown next to the data.
    pub fn label(&self) -> &'static str {
        match self {
            Freshness::Fresh => "Datos frescos",
            Freshness::Recent => "Datos recientes",
            Freshness::Stale => "Datos desactualizados",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minutes_ago: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2025, 6, 28, 12, 0, 0).unwrap();
        (now - Duration::minutes(minutes_ago), now)
    }

    #[test]
    fn boundaries() {
        let t = FreshnessThresholds::default();
        let (ts, now) = at(0);
        assert_eq!(Freshness::classify(ts, now, &t), Freshness::Fresh);
        let (ts, now) = at(4);
        assert_eq!(Freshness::classify(ts, now, &t), Freshness::Fresh);
        let (ts, now) = at(5);
        assert_eq!(Freshness::classify(ts, now, &t), Freshness::Recent);
        let (ts, now) = at(29);
        assert_eq!(Freshness::classify(ts, now, &t), Freshness::Recent);
        let (ts, now) = at(30);
        assert_eq!(Freshness::classify(ts, now, &t), Freshness::Stale);
    }

    #[test]
    fn future_timestamps_are_fresh() {
        let (ts, now) = at(-10);
        assert_eq!(
            Freshness::classify(ts, now, &FreshnessThresholds::default()),
            Freshness::Fresh
        );
    }

    #[test]
    fn classification_is_monotonic_in_age() {
        let t = FreshnessThresholds::default();
        let mut previous = Freshness::Fresh;
        for minutes in 0..120 {
            let (ts, now) = at(minutes);
            let current = Freshness::classify(ts, now, &t);
            assert!(current >= previous, "age {minutes}m went from {previous:?} to {current:?}");
            previous = current;
        }
    }

    #[test]
    fn custom_thresholds() {
        let t = FreshnessThresholds {
            fresh: Duration::seconds(10),
            recent: Duration::seconds(20),
        };
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 30).unwrap();
        assert_eq!(Freshness::classify(now - Duration::seconds(15), now, &t), Freshness::Recent);
        assert_eq!(Freshness::classify(now - Duration::seconds(25), now, &t), Freshness::Stale);
    }
}
