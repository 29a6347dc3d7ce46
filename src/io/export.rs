//! CSV exports.
//!
//! - cleaned tables, with the original header and canonical `YYYY-MM-DD` dates
//! - bulk clearing comparisons, one row per settlement interval

use std::fs::File;
use std::path::Path;

use crate::clearing::PriceComparison;
use crate::domain::Table;
use crate::error::AppError;

fn create_writer(path: &Path, what: &str) -> Result<csv::Writer<File>, AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create {what} '{}': {e}", path.display())))?;
    Ok(csv::Writer::from_writer(file))
}

/// Write a (cleaned) table back to CSV.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<(), AppError> {
    let mut wtr = create_writer(path, "table CSV")?;

    wtr.write_record(table.columns())
        .map_err(|e| AppError::input(format!("Failed to write table CSV header: {e}")))?;
    for row in table.rows() {
        wtr.write_record(&row.cells)
            .map_err(|e| AppError::input(format!("Failed to write table CSV row: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| AppError::input(format!("Failed to flush table CSV: {e}")))?;

    Ok(())
}

/// Write clearing comparisons to CSV.
pub fn write_comparison_csv(path: &Path, comparisons: &[PriceComparison]) -> Result<(), AppError> {
    let mut wtr = create_writer(path, "comparison CSV")?;

    wtr.write_record([
        "datetime",
        "date",
        "period",
        "demand",
        "actual_usep",
        "calculated_price",
        "abs_error",
    ])
    .map_err(|e| AppError::input(format!("Failed to write comparison CSV header: {e}")))?;

    for c in comparisons {
        wtr.write_record([
            c.interval_start.format("%Y-%m-%d %H:%M").to_string(),
            c.date.to_string(),
            c.period.to_string(),
            format!("{:.3}", c.demand),
            format!("{:.2}", c.actual_usep),
            format!("{:.2}", c.calculated_price),
            format!("{:.2}", c.abs_error()),
        ])
        .map_err(|e| AppError::input(format!("Failed to write comparison CSV row: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| AppError::input(format!("Failed to flush comparison CSV: {e}")))?;

    Ok(())
}
