//! Shared pipeline steps used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> validate -> clean -> typed rows -> clearing / statistics
//!
//! The subcommands in `app` then only decide what to print and export.

use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::clean::{CleanStats, clean_with_stats};
use crate::clearing::{ClearingError, ClearingPoint, CurveStep, MeritOrderCurve};
use crate::domain::{DatasetKind, DatasetSettings, OfferRow, SettlementRow, Table};
use crate::error::AppError;
use crate::io::ingest::{Extracted, LoadOptions, LoadedTable, RowError, load_table, offers_from_table, settlements_from_table};
use crate::validate::{ValidationReport, validate};

/// One extract after loading, validation and cleaning.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub kind: DatasetKind,
    pub loaded: LoadedTable,
    pub report: ValidationReport,
    pub cleaned: Table,
    pub stats: CleanStats,
}

impl PreparedDataset {
    pub fn raw(&self) -> &Table {
        &self.loaded.table
    }
}

/// Load one extract with the kind's header handling.
///
/// `merit_skip_rows` only applies to the merit-order file.
pub fn load_dataset(path: &Path, kind: DatasetKind, merit_skip_rows: usize) -> Result<LoadedTable, AppError> {
    let mut options = LoadOptions::for_kind(kind);
    if kind == DatasetKind::Merit {
        options.skip_rows = merit_skip_rows;
    }
    let loaded = load_table(path, &options)?;
    log_row_errors(kind, "skipped ragged CSV record", &loaded.row_errors);
    Ok(loaded)
}

/// Validate the raw table and clean it. The raw table is kept untouched.
pub fn prepare_dataset(loaded: LoadedTable, kind: DatasetKind, settings: &DatasetSettings) -> PreparedDataset {
    let report = validate(&loaded.table, &settings.validation);
    let (cleaned, stats) = clean_with_stats(&loaded.table, &settings.cleaning);
    info!(
        kind = ?kind,
        raw = loaded.table.len(),
        cleaned = cleaned.len(),
        issues = report.issues_found,
        "dataset prepared"
    );
    PreparedDataset {
        kind,
        loaded,
        report,
        cleaned,
        stats,
    }
}

pub fn load_and_prepare(
    path: &Path,
    kind: DatasetKind,
    settings: &DatasetSettings,
    merit_skip_rows: usize,
) -> Result<PreparedDataset, AppError> {
    let loaded = load_dataset(path, kind, merit_skip_rows)?;
    Ok(prepare_dataset(loaded, kind, settings))
}

/// Typed offers from a cleaned merit-order table.
pub fn extract_offers(dataset: &PreparedDataset, settings: &DatasetSettings) -> Result<Vec<OfferRow>, AppError> {
    let Extracted { rows, row_errors } = offers_from_table(&dataset.cleaned, &settings.cleaning.roles)?;
    log_row_errors(dataset.kind, "offer row not usable", &row_errors);
    if rows.is_empty() {
        return Err(AppError::no_data("No usable merit-order offers after cleaning."));
    }
    Ok(rows)
}

/// Typed intervals from a cleaned settlement table.
pub fn extract_settlements(
    dataset: &PreparedDataset,
    settings: &DatasetSettings,
) -> Result<Vec<SettlementRow>, AppError> {
    let Extracted { rows, row_errors } = settlements_from_table(&dataset.cleaned, &settings.cleaning.roles)?;
    log_row_errors(dataset.kind, "settlement row not usable", &row_errors);
    if rows.is_empty() {
        return Err(AppError::no_data("No usable settlement intervals after cleaning."));
    }
    Ok(rows)
}

/// Curve and clearing result for one interval and demand.
#[derive(Debug, Clone)]
pub struct ClearingOutcome {
    pub curve: MeritOrderCurve,
    pub point: ClearingPoint,
    pub marginal: CurveStep,
}

pub fn clear_interval(offers: &[OfferRow], date: NaiveDate, period: u8, demand: f64) -> Result<ClearingOutcome, AppError> {
    let curve =
        MeritOrderCurve::build(offers, date, period).ok_or(ClearingError::NotFound { date, period, demand })?;
    let marginal = *curve.clearing_step(demand)?;
    info!(%date, period, demand, price = marginal.price, "clearing price computed");
    Ok(ClearingOutcome {
        point: ClearingPoint {
            demand,
            price: marginal.price,
        },
        marginal,
        curve,
    })
}

fn log_row_errors(kind: DatasetKind, what: &str, errors: &[RowError]) {
    for e in errors {
        warn!(kind = ?kind, line = e.line, reason = %e.message, "{what}");
    }
}
