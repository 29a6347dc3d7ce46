//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during validation, cleaning and clearing
//! - exported to JSON/CSV
//! - supplied through configuration files

use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Number of half-hour trading periods in a day.
pub const PERIODS_PER_DAY: u8 = 48;

/// Which extract a table was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Merit-order offer stack (price/volume points per date+period).
    Merit,
    /// Settlement price and demand series (one row per interval).
    Settlement,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 2] = [DatasetKind::Merit, DatasetKind::Settlement];

    pub fn display_name(self) -> &'static str {
        match self {
            DatasetKind::Merit => "Merit Order Data",
            DatasetKind::Settlement => "USEP Data",
        }
    }
}

/// Inclusive calendar-date window, compared at day granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The coverage window of the January 2023 extracts.
    pub fn reporting_default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2023, 1, 31).unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// One point on a discrete supply curve for one trading date+period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfferRow {
    pub date: NaiveDate,
    pub period: u8,
    /// Offer price ($/MWh). May be negative.
    pub price: f64,
    /// Offered volume (MW).
    pub volume: f64,
}

/// One settled half-hour interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRow {
    pub information_type: Option<String>,
    pub date: NaiveDate,
    pub period: u8,
    /// USEP ($/MWh).
    pub clearing_price: f64,
    /// LCP ($/MWh).
    pub load_clearing_price: Option<f64>,
    /// Demand (MW).
    pub demand: f64,
    /// TCL (MW).
    pub transmission_loss: Option<f64>,
}

/// `true` when `period` is a valid half-hour slot (1..=48).
pub fn is_valid_period(period: f64) -> bool {
    (1.0..=f64::from(PERIODS_PER_DAY)).contains(&period)
}

/// Start time of a trading interval: `date + (period - 1) * 30min`.
pub fn interval_start(date: NaiveDate, period: u8) -> NaiveDateTime {
    let minutes = i64::from(period.saturating_sub(1)) * 30;
    date.and_time(chrono::NaiveTime::MIN) + Duration::minutes(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_start_offsets_by_half_hours() {
        let d = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(interval_start(d, 1).to_string(), "2023-01-01 00:00:00");
        assert_eq!(interval_start(d, 2).to_string(), "2023-01-01 00:30:00");
        assert_eq!(interval_start(d, 48).to_string(), "2023-01-01 23:30:00");
    }

    #[test]
    fn period_bounds_are_inclusive() {
        assert!(is_valid_period(1.0));
        assert!(is_valid_period(48.0));
        assert!(!is_valid_period(0.0));
        assert!(!is_valid_period(49.0));
        assert!(!is_valid_period(f64::NAN));
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        let a = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        let b = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert!(DateRange::new(a, b).is_none());
        let r = DateRange::new(b, a).unwrap();
        assert!(r.contains(a));
        assert!(r.contains(b));
        assert!(!r.contains(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()));
    }
}
