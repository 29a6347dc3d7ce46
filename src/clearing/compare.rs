//! Bulk clearing: recompute the price of every settlement interval from the
//! merit-order curve and line it up with the published USEP.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, warn};

use super::{ClearingError, MeritOrderBook};
use crate::domain::{OfferRow, SettlementRow, interval_start};
use crate::math::{Summary, describe, mean};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceComparison {
    pub interval_start: NaiveDateTime,
    pub date: NaiveDate,
    pub period: u8,
    pub demand: f64,
    pub actual_usep: f64,
    pub calculated_price: f64,
}

impl PriceComparison {
    pub fn abs_error(&self) -> f64 {
        (self.actual_usep - self.calculated_price).abs()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComparisonRun {
    pub comparisons: Vec<PriceComparison>,
    pub failures: Vec<ClearingError>,
}

impl ComparisonRun {
    pub fn attempted(&self) -> usize {
        self.comparisons.len() + self.failures.len()
    }

    pub fn mean_absolute_error(&self) -> Option<f64> {
        let errors: Vec<f64> = self.comparisons.iter().map(PriceComparison::abs_error).collect();
        mean(&errors)
    }

    pub fn actual_summary(&self) -> Option<Summary> {
        let values: Vec<f64> = self.comparisons.iter().map(|c| c.actual_usep).collect();
        describe(&values)
    }

    pub fn calculated_summary(&self) -> Option<Summary> {
        let values: Vec<f64> = self.comparisons.iter().map(|c| c.calculated_price).collect();
        describe(&values)
    }

    pub fn not_found_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f, ClearingError::NotFound { .. }))
            .count()
    }

    pub fn out_of_range_count(&self) -> usize {
        self.failures.len() - self.not_found_count()
    }
}

/// Clear every settlement row against the offers of its own interval.
///
/// A failed interval is logged and collected; the batch always completes.
pub fn compare_with_settlement(offers: &[OfferRow], settlements: &[SettlementRow]) -> ComparisonRun {
    let book = MeritOrderBook::from_offers(offers);
    debug!(intervals = book.len(), rows = settlements.len(), "comparing clearing prices");

    let mut run = ComparisonRun::default();
    for row in settlements {
        match book.clearing_price(row.date, row.period, row.demand) {
            Ok(calculated_price) => run.comparisons.push(PriceComparison {
                interval_start: interval_start(row.date, row.period),
                date: row.date,
                period: row.period,
                demand: row.demand,
                actual_usep: row.clearing_price,
                calculated_price,
            }),
            Err(err) => {
                warn!(
                    date = %row.date,
                    period = row.period,
                    demand = row.demand,
                    error = %err,
                    "clearing price calculation failed"
                );
                run.failures.push(err);
            }
        }
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn offer(date: NaiveDate, period: u8, price: f64, volume: f64) -> OfferRow {
        OfferRow {
            date,
            period,
            price,
            volume,
        }
    }

    fn settlement(date: NaiveDate, period: u8, usep: f64, demand: f64) -> SettlementRow {
        SettlementRow {
            information_type: None,
            date,
            period,
            clearing_price: usep,
            load_clearing_price: None,
            demand,
            transmission_loss: None,
        }
    }

    #[test]
    fn collects_comparisons_and_failures() {
        let offers = vec![
            offer(day(1), 1, 80.0, 3000.0),
            offer(day(1), 1, 120.0, 3000.0),
            offer(day(1), 2, 90.0, 6000.0),
        ];
        let settlements = vec![
            settlement(day(1), 1, 100.0, 5000.0),
            settlement(day(1), 2, 95.0, 5500.0),
            settlement(day(1), 3, 95.0, 5500.0),
            settlement(day(1), 2, 95.0, 6500.0),
        ];

        let run = compare_with_settlement(&offers, &settlements);
        assert_eq!(run.attempted(), 4);
        assert_eq!(run.comparisons.len(), 2);
        assert_eq!(run.not_found_count(), 1);
        assert_eq!(run.out_of_range_count(), 1);

        let first = run.comparisons[0];
        assert_eq!(first.calculated_price, 120.0);
        assert_eq!(first.interval_start, day(1).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(run.comparisons[1].interval_start, day(1).and_hms_opt(0, 30, 0).unwrap());

        // |100 - 120| and |95 - 90|
        let mae = run.mean_absolute_error().unwrap();
        assert!((mae - 12.5).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_give_empty_run() {
        let run = compare_with_settlement(&[], &[]);
        assert_eq!(run.attempted(), 0);
        assert!(run.mean_absolute_error().is_none());
        assert!(run.actual_summary().is_none());
    }
}
