//! Statistics over a cleaned settlement series.
//!
//! Everything here is descriptive or a classical two-sample/normality test;
//! the inputs are the settlement rows in file order. Tests that cannot be
//! computed (too few observations, zero variance) come back as `None` instead
//! of NaN so the report can say so.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};
use tracing::debug;

use crate::domain::SettlementRow;
use crate::math::{LineFit, fit_line, mean, pearson, sample_std, sample_variance};

/// Half-hour periods counted as peak (09:00 to 17:00).
pub const PEAK_PERIODS: RangeInclusive<u8> = 18..=33;

pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub mean: f64,
    /// NaN with a single observation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesStats {
    fn of(values: &[f64]) -> Option<Self> {
        Some(Self {
            mean: mean(values)?,
            std: sample_std(values).unwrap_or(f64::NAN),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub demand: SeriesStats,
    pub usep: SeriesStats,
}

/// A test statistic with its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

impl TestOutcome {
    pub fn is_significant(&self) -> bool {
        self.p_value < SIGNIFICANCE_LEVEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MannWhitney {
    pub u: f64,
    pub z: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JarqueBera {
    pub statistic: f64,
    pub skewness: f64,
    /// Plain (non-excess) kurtosis; 3 for a normal sample.
    pub kurtosis: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketAnalysis {
    pub observations: usize,
    pub daily: Vec<DailyStats>,
    pub correlation: Option<f64>,
    pub elasticity: Option<f64>,
    pub peak_count: usize,
    pub offpeak_count: usize,
    pub peak_vs_offpeak: Option<TestOutcome>,
    pub mann_whitney: Option<MannWhitney>,
    pub normality: Option<JarqueBera>,
    pub regression: Option<LineFit>,
}

pub fn analyze_settlement(rows: &[SettlementRow]) -> MarketAnalysis {
    let demand: Vec<f64> = rows.iter().map(|r| r.demand).collect();
    let usep: Vec<f64> = rows.iter().map(|r| r.clearing_price).collect();

    let (peak, offpeak): (Vec<&SettlementRow>, Vec<&SettlementRow>) =
        rows.iter().partition(|r| PEAK_PERIODS.contains(&r.period));
    let peak_demand: Vec<f64> = peak.iter().map(|r| r.demand).collect();
    let offpeak_demand: Vec<f64> = offpeak.iter().map(|r| r.demand).collect();

    let analysis = MarketAnalysis {
        observations: rows.len(),
        daily: daily_stats(rows),
        correlation: pearson(&demand, &usep),
        elasticity: price_elasticity(&usep, &demand),
        peak_count: peak_demand.len(),
        offpeak_count: offpeak_demand.len(),
        peak_vs_offpeak: students_t_test(&peak_demand, &offpeak_demand),
        mann_whitney: mann_whitney_u(&peak_demand, &offpeak_demand),
        normality: jarque_bera(&usep),
        regression: fit_line(&demand, &usep),
    };

    debug!(
        observations = analysis.observations,
        days = analysis.daily.len(),
        peak = analysis.peak_count,
        offpeak = analysis.offpeak_count,
        "settlement analysis finished"
    );
    analysis
}

/// Demand and USEP statistics per trading date, in date order.
pub fn daily_stats(rows: &[SettlementRow]) -> Vec<DailyStats> {
    let mut by_date: BTreeMap<NaiveDate, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in rows {
        let (demand, usep) = by_date.entry(row.date).or_default();
        demand.push(row.demand);
        usep.push(row.clearing_price);
    }

    by_date
        .into_iter()
        .filter_map(|(date, (demand, usep))| {
            Some(DailyStats {
                date,
                demand: SeriesStats::of(&demand)?,
                usep: SeriesStats::of(&usep)?,
            })
        })
        .collect()
}

/// Mean ratio of consecutive percentage changes, demand over price.
///
/// Steps where the price does not move are skipped, as are steps from a zero
/// base where the percentage change is undefined.
pub fn price_elasticity(prices: &[f64], demand: &[f64]) -> Option<f64> {
    if prices.len() != demand.len() {
        return None;
    }
    let ratios: Vec<f64> = prices
        .windows(2)
        .zip(demand.windows(2))
        .filter_map(|(p, d)| {
            let dp = (p[1] - p[0]) / p[0];
            let dd = (d[1] - d[0]) / d[0];
            if dp == 0.0 {
                return None;
            }
            let ratio = dd / dp;
            ratio.is_finite().then_some(ratio)
        })
        .collect();
    mean(&ratios)
}

/// Two-sample Student t-test with pooled variance.
pub fn students_t_test(a: &[f64], b: &[f64]) -> Option<TestOutcome> {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let df = n1 + n2 - 2.0;
    let pooled = ((n1 - 1.0) * sample_variance(a)? + (n2 - 1.0) * sample_variance(b)?) / df;
    if pooled <= 0.0 {
        return None;
    }

    let t = (mean(a)? - mean(b)?) / (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(TestOutcome {
        statistic: t,
        p_value: 2.0 * (1.0 - dist.cdf(t.abs())),
    })
}

/// Mann-Whitney U test of `a` against `b`.
///
/// Uses the normal approximation with a tie-corrected variance; `u` is the
/// statistic for `a`.
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> Option<MannWhitney> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let n = n1 + n2;

    let mut pooled: Vec<(f64, bool)> = a
        .iter()
        .map(|v| (*v, true))
        .chain(b.iter().map(|v| (*v, false)))
        .collect();
    pooled.sort_by(|x, y| x.0.total_cmp(&y.0));

    let mut rank_sum_a = 0.0;
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < pooled.len() {
        let mut j = i;
        while j + 1 < pooled.len() && pooled[j + 1].0 == pooled[i].0 {
            j += 1;
        }
        // Ranks are 1-based; tied values share the average rank.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        let ties = (j - i + 1) as f64;
        rank_sum_a += avg_rank * pooled[i..=j].iter().filter(|(_, from_a)| *from_a).count() as f64;
        tie_term += ties.powi(3) - ties;
        i = j + 1;
    }

    let u = rank_sum_a - n1 * (n1 + 1.0) / 2.0;
    let mu = n1 * n2 / 2.0;
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance <= 0.0 {
        return None;
    }

    let z = (u - mu) / variance.sqrt();
    let normal = Normal::new(0.0, 1.0).ok()?;
    Some(MannWhitney {
        u,
        z,
        p_value: 2.0 * (1.0 - normal.cdf(z.abs())),
    })
}

/// Jarque-Bera normality test against a chi-squared(2) reference.
pub fn jarque_bera(values: &[f64]) -> Option<JarqueBera> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let m = mean(values)?;
    let moment = |k: i32| values.iter().map(|v| (v - m).powi(k)).sum::<f64>() / n;
    let m2 = moment(2);
    if m2 <= 0.0 {
        return None;
    }

    let skewness = moment(3) / m2.powf(1.5);
    let kurtosis = moment(4) / (m2 * m2);
    let statistic = n / 6.0 * (skewness.powi(2) + (kurtosis - 3.0).powi(2) / 4.0);
    let chi2 = ChiSquared::new(2.0).ok()?;
    Some(JarqueBera {
        statistic,
        skewness,
        kurtosis,
        p_value: 1.0 - chi2.cdf(statistic),
    })
}
