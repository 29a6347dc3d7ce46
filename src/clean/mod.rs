//! Row filtering ahead of the clearing engine.
//!
//! The cleaner drops every row that would make a clearing calculation
//! meaningless, in this order:
//!
//! 1. dates that do not parse (or have an impossible day-of-month); surviving
//!    dates are rewritten as `YYYY-MM-DD`
//! 2. periods outside 1..=48
//! 3. dates outside the reporting window
//! 4. kind-specific domain bounds: price + volume (merit) or price + demand
//!    (settlement)
//!
//! Missing or unparseable numbers fail their comparison and are dropped as
//! well. A table missing one of the role columns comes back empty; the cleaner
//! never returns an error. Cleaning an already-cleaned table removes nothing.

use tracing::{debug, warn};

use crate::domain::{Bound, BoundKind, CleanConfig, DatasetKind, Table, is_valid_period, parse_number};
use crate::io::ingest::parse_trading_date;

/// Canonical date format written back into cleaned tables.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Rows removed by each cleaning step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    /// Rows dropped because a role column is absent; the steps below did not run.
    pub missing_columns: usize,
    pub invalid_dates: usize,
    pub invalid_periods: usize,
    pub outside_window: usize,
    pub out_of_bounds: usize,
}

impl CleanStats {
    pub fn total(&self) -> usize {
        self.missing_columns + self.invalid_dates + self.invalid_periods + self.outside_window + self.out_of_bounds
    }
}

/// Clean with the static defaults for `kind`.
pub fn clean(table: &Table, kind: DatasetKind) -> Table {
    clean_with(table, &CleanConfig::for_kind(kind))
}

/// Clean with an explicit configuration.
pub fn clean_with(table: &Table, config: &CleanConfig) -> Table {
    clean_with_stats(table, config).0
}

/// Clean and report how many rows each step removed.
pub fn clean_with_stats(table: &Table, config: &CleanConfig) -> (Table, CleanStats) {
    let mut stats = CleanStats::default();
    let roles = &config.roles;

    let (Some(date), Some(period), Some(price), Some(quantity)) = (
        table.column_index(&roles.date),
        table.column_index(&roles.period),
        table.column_index(&roles.price),
        table.column_index(&roles.quantity),
    ) else {
        warn!(
            kind = ?config.kind,
            "required columns missing; cleaning produced an empty table"
        );
        stats.missing_columns = table.len();
        return (table.empty_like(), stats);
    };

    // 1) Date parse + canonicalization.
    let dated = table.filter(|r| parse_trading_date(r.get(date)).is_some());
    stats.invalid_dates = table.len() - dated.len();
    let dated = dated.map_column(date, |cell| {
        parse_trading_date(cell)
            .map(|d| d.format(CANONICAL_DATE_FORMAT).to_string())
            .unwrap_or_default()
    });

    // 2) Fixed period range.
    let periods = dated.filter(|r| parse_number(r.get(period)).is_some_and(is_valid_period));
    stats.invalid_periods = dated.len() - periods.len();

    // 3) Reporting window.
    let window = config.date_range;
    let windowed = periods.filter(|r| parse_trading_date(r.get(date)).is_some_and(|d| window.contains(d)));
    stats.outside_window = periods.len() - windowed.len();

    // 4) Domain bounds.
    let quantity_kind = match config.kind {
        DatasetKind::Merit => BoundKind::Volume,
        DatasetKind::Settlement => BoundKind::Demand,
    };
    let bounds = config.bounds.clone().or_defaults();
    let (Some(price_bound), Some(quantity_bound)) = (bounds.get(BoundKind::Price), bounds.get(quantity_kind)) else {
        // `or_defaults` always fills both kinds.
        return (windowed, stats);
    };
    let cleaned = windowed.filter(|r| {
        let in_bounds = |idx: usize, bound: &Bound| parse_number(r.get(idx)).is_some_and(|v| bound.contains(v));
        in_bounds(price, price_bound) && in_bounds(quantity, quantity_bound)
    });
    stats.out_of_bounds = windowed.len() - cleaned.len();

    debug!(
        kind = ?config.kind,
        before = table.len(),
        after = cleaned.len(),
        invalid_dates = stats.invalid_dates,
        invalid_periods = stats.invalid_periods,
        outside_window = stats.outside_window,
        out_of_bounds = stats.out_of_bounds,
        "cleaning finished"
    );

    (cleaned, stats)
}
