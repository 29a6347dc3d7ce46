//! Merit-order clearing.
//!
//! For one trading date+period, offers are sorted by ascending price (stable on
//! ties) and their volumes accumulated. The clearing price for a demand is the
//! price of the first step whose cumulative volume reaches the demand: the
//! cheapest offers are dispatched first and the marginal accepted offer sets
//! the price.
//!
//! The engine is strict. An interval without offers is `NotFound`, a demand
//! the whole curve cannot cover is `OutOfRange`; neither falls back to a
//! nearby price.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::domain::{OfferRow, interval_start};
use crate::error::AppError;

pub mod compare;

pub use compare::*;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClearingError {
    #[error("No merit-order offers for {date} period {period} (demand {demand} MW).")]
    NotFound { date: NaiveDate, period: u8, demand: f64 },

    #[error(
        "Demand {demand} MW cannot be met on {date} period {period}: only {available} MW offered."
    )]
    OutOfRange {
        date: NaiveDate,
        period: u8,
        demand: f64,
        available: f64,
    },
}

impl From<ClearingError> for AppError {
    fn from(err: ClearingError) -> Self {
        AppError::calculation(err.to_string())
    }
}

/// One offer on the sorted curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurveStep {
    pub price: f64,
    pub volume: f64,
    /// Running total of `volume` up to and including this step.
    pub cumulative_volume: f64,
}

/// Sorted supply curve for one (date, period). Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeritOrderCurve {
    pub date: NaiveDate,
    pub period: u8,
    steps: Vec<CurveStep>,
}

impl MeritOrderCurve {
    /// Build the curve for `date`/`period` from any offer list; `None` when
    /// the interval has no offers.
    pub fn build(offers: &[OfferRow], date: NaiveDate, period: u8) -> Option<Self> {
        let matching: Vec<&OfferRow> = offers
            .iter()
            .filter(|o| o.date == date && o.period == period)
            .collect();
        Self::from_matching(&matching, date, period)
    }

    fn from_matching(offers: &[&OfferRow], date: NaiveDate, period: u8) -> Option<Self> {
        if offers.is_empty() {
            return None;
        }

        let mut sorted: Vec<(f64, f64)> = offers.iter().map(|o| (o.price, o.volume)).collect();
        // `sort_by` is stable, so equal prices keep their input order.
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut cumulative = 0.0;
        let steps = sorted
            .into_iter()
            .map(|(price, volume)| {
                cumulative += volume;
                CurveStep {
                    price,
                    volume,
                    cumulative_volume: cumulative,
                }
            })
            .collect();

        Some(Self { date, period, steps })
    }

    pub fn steps(&self) -> &[CurveStep] {
        &self.steps
    }

    pub fn interval_start(&self) -> NaiveDateTime {
        interval_start(self.date, self.period)
    }

    pub fn total_volume(&self) -> f64 {
        self.steps.last().map(|s| s.cumulative_volume).unwrap_or(0.0)
    }

    pub fn min_price(&self) -> f64 {
        self.steps.first().map(|s| s.price).unwrap_or(f64::NAN)
    }

    pub fn max_price(&self) -> f64 {
        self.steps.last().map(|s| s.price).unwrap_or(f64::NAN)
    }

    /// The marginal step that clears `demand`.
    pub fn clearing_step(&self, demand: f64) -> Result<&CurveStep, ClearingError> {
        self.steps
            .iter()
            .find(|s| s.cumulative_volume >= demand)
            .ok_or(ClearingError::OutOfRange {
                date: self.date,
                period: self.period,
                demand,
                available: self.total_volume(),
            })
    }

    /// Lowest price at which cumulative offered volume meets `demand`.
    pub fn clearing_price(&self, demand: f64) -> Result<f64, ClearingError> {
        self.clearing_step(demand).map(|s| s.price)
    }

    pub fn clearing_point(&self, demand: f64) -> Result<ClearingPoint, ClearingError> {
        self.clearing_price(demand).map(|price| ClearingPoint { demand, price })
    }
}

/// Where a demand meets the curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClearingPoint {
    pub demand: f64,
    pub price: f64,
}

/// Clearing price for one interval straight from an offer list.
pub fn clearing_price(offers: &[OfferRow], date: NaiveDate, period: u8, demand: f64) -> Result<f64, ClearingError> {
    MeritOrderCurve::build(offers, date, period)
        .ok_or(ClearingError::NotFound { date, period, demand })?
        .clearing_price(demand)
}

/// Every interval's curve, built once for repeated lookups.
#[derive(Debug, Clone, Default)]
pub struct MeritOrderBook {
    curves: BTreeMap<(NaiveDate, u8), MeritOrderCurve>,
}

impl MeritOrderBook {
    pub fn from_offers(offers: &[OfferRow]) -> Self {
        let mut grouped: BTreeMap<(NaiveDate, u8), Vec<&OfferRow>> = BTreeMap::new();
        for offer in offers {
            grouped.entry((offer.date, offer.period)).or_default().push(offer);
        }

        let curves = grouped
            .into_iter()
            .filter_map(|((date, period), offers)| {
                MeritOrderCurve::from_matching(&offers, date, period).map(|curve| ((date, period), curve))
            })
            .collect();

        Self { curves }
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn curve(&self, date: NaiveDate, period: u8) -> Option<&MeritOrderCurve> {
        self.curves.get(&(date, period))
    }

    pub fn clearing_price(&self, date: NaiveDate, period: u8, demand: f64) -> Result<f64, ClearingError> {
        self.curve(date, period)
            .ok_or(ClearingError::NotFound { date, period, demand })?
            .clearing_price(demand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn jan1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
    }

    fn offer(price: f64, volume: f64) -> OfferRow {
        OfferRow {
            date: jan1(),
            period: 1,
            price,
            volume,
        }
    }

    fn reference_offers() -> Vec<OfferRow> {
        // Deliberately unsorted.
        vec![
            offer(100.0, 400.0),
            offer(-100.0, 100.0),
            offer(200.0, 500.0),
            offer(0.0, 200.0),
            offer(50.0, 300.0),
        ]
    }

    fn random_curve(rng: &mut StdRng) -> Vec<OfferRow> {
        let n = rng.gen_range(1..40);
        (0..n)
            .map(|_| offer(rng.gen_range(-500.0..3000.0), rng.gen_range(0.0..300.0)))
            .collect()
    }

    #[test]
    fn reference_scenario() {
        let offers = reference_offers();
        assert_eq!(clearing_price(&offers, jan1(), 1, 50.0), Ok(-100.0));
        assert_eq!(clearing_price(&offers, jan1(), 1, 250.0), Ok(0.0));
        assert_eq!(clearing_price(&offers, jan1(), 1, 1500.0), Ok(200.0));
        assert_eq!(
            clearing_price(&offers, jan1(), 1, 1501.0),
            Err(ClearingError::OutOfRange {
                date: jan1(),
                period: 1,
                demand: 1501.0,
                available: 1500.0,
            })
        );
    }

    #[test]
    fn missing_interval_is_not_found() {
        let offers = reference_offers();
        assert_eq!(
            clearing_price(&offers, jan1(), 2, 10.0),
            Err(ClearingError::NotFound {
                date: jan1(),
                period: 2,
                demand: 10.0,
            })
        );
        let err = clearing_price(&[], jan1(), 7, 5400.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No merit-order offers for 2023-01-01 period 7 (demand 5400 MW)."
        );
        assert!(MeritOrderCurve::build(&offers, jan1(), 2).is_none());
    }

    #[test]
    fn exact_step_boundary_clears_at_that_step() {
        let offers = reference_offers();
        assert_eq!(clearing_price(&offers, jan1(), 1, 100.0), Ok(-100.0));
        assert_eq!(clearing_price(&offers, jan1(), 1, 100.5), Ok(0.0));
        assert_eq!(clearing_price(&offers, jan1(), 1, 0.0), Ok(-100.0));
    }

    #[test]
    fn other_intervals_are_ignored() {
        let mut offers = reference_offers();
        offers.push(OfferRow {
            date: jan1(),
            period: 2,
            price: -999.0,
            volume: 10_000.0,
        });
        assert_eq!(clearing_price(&offers, jan1(), 1, 50.0), Ok(-100.0));
    }

    #[test]
    fn equal_prices_do_not_change_the_result() {
        let offers = vec![offer(10.0, 5.0), offer(10.0, 7.0), offer(5.0, 1.0)];
        let curve = MeritOrderCurve::build(&offers, jan1(), 1).unwrap();
        let volumes: Vec<f64> = curve.steps().iter().map(|s| s.volume).collect();
        assert_eq!(volumes, vec![1.0, 5.0, 7.0]);
        assert_eq!(curve.clearing_price(12.5), Ok(10.0));
    }

    #[test]
    fn cumulative_volume_is_monotone_and_sums_volumes() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let offers = random_curve(&mut rng);
            let curve = MeritOrderCurve::build(&offers, jan1(), 1).unwrap();
            let steps = curve.steps();
            for w in steps.windows(2) {
                assert!(w[0].price <= w[1].price);
                assert!(w[0].cumulative_volume <= w[1].cumulative_volume);
            }
            let sum: f64 = offers.iter().map(|o| o.volume).sum();
            assert!((curve.total_volume() - sum).abs() < 1e-6);
        }
    }

    #[test]
    fn clearing_price_is_monotone_in_demand() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let offers = random_curve(&mut rng);
            let curve = MeritOrderCurve::build(&offers, jan1(), 1).unwrap();
            let total = curve.total_volume();

            let mut prev = f64::NEG_INFINITY;
            for i in 0..=50 {
                let demand = total * (i as f64 / 50.0);
                let price = curve.clearing_price(demand).unwrap();
                assert!(price >= prev);
                prev = price;
            }

            // Demand equal to the full stack clears at the highest offered price
            // (or earlier when the top offers carry zero volume).
            let at_total = curve.clearing_price(total).unwrap();
            assert!(at_total <= curve.max_price());
            assert_eq!(curve.clearing_step(total).unwrap().cumulative_volume, total);

            // Demand within the cheapest offer clears at the lowest price.
            let first = curve.steps()[0];
            assert_eq!(curve.clearing_price(first.volume), Ok(curve.min_price()));

            assert!(matches!(
                curve.clearing_price(total + 1.0),
                Err(ClearingError::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn book_matches_single_curve_lookups() {
        let mut offers = reference_offers();
        offers.push(OfferRow {
            date: jan1(),
            period: 2,
            price: 30.0,
            volume: 50.0,
        });
        let book = MeritOrderBook::from_offers(&offers);
        assert_eq!(book.len(), 2);
        assert_eq!(book.clearing_price(jan1(), 1, 250.0), Ok(0.0));
        assert_eq!(book.clearing_price(jan1(), 2, 50.0), Ok(30.0));
        assert!(matches!(
            book.clearing_price(jan1(), 3, 1.0),
            Err(ClearingError::NotFound { period: 3, demand, .. }) if demand == 1.0
        ));
        assert!(book.curve(jan1(), 3).is_none());
    }

    #[test]
    fn errors_convert_to_calculation_exit_code() {
        let err: AppError = ClearingError::NotFound {
            date: jan1(),
            period: 7,
            demand: 5400.0,
        }
        .into();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("2023-01-01 period 7"));
        assert!(err.to_string().contains("5400"));
    }
}
