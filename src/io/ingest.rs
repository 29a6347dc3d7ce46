//! CSV ingest and typed row extraction.
//!
//! This module turns the raw market extracts into a `Table` (text cells, no
//! typing decisions yet) and, on request, into typed `OfferRow`/`SettlementRow`
//! values for the clearing engine and the statistics.
//!
//! Design goals:
//! - **Loading never judges data quality**: only structural problems (missing
//!   file, header length mismatch) are errors; ragged records are skipped and
//!   reported as row errors.
//! - **Permissive dates**: extracts mix `2023-01-01`, `01 Jan 2023`,
//!   `01-Jan-2023` and `01/01/2023`; all of them parse.
//! - **Deterministic behavior** (no hidden randomness)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{
    ColumnRoles, DatasetKind, MERIT_COLUMNS, OfferRow, Row, SettlementRow, Table, USEP_INFORMATION_TYPE, USEP_LCP,
    USEP_TCL, is_null, is_valid_period, parse_number,
};
use crate::error::AppError;

// Ambiguous numeric dates read month-first; day-first only when that fails.
const DATE_FORMATS: [&str; 11] = [
    "%Y-%m-%d",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%d-%B-%Y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%b %d %Y",
];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d %b %Y %H:%M",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

/// How a file is turned into a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Leading records to discard before the header record.
    pub skip_rows: usize,
    /// Replace the file's header with these names (must match in length).
    pub rename_columns: Option<Vec<String>>,
}

impl LoadOptions {
    /// The merit-order extract carries two banner lines and verbose headers.
    pub fn for_kind(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Merit => Self {
                skip_rows: 2,
                rename_columns: Some(MERIT_COLUMNS.iter().map(|c| c.to_string()).collect()),
            },
            DatasetKind::Settlement => Self {
                skip_rows: 0,
                rename_columns: None,
            },
        }
    }
}

/// A row-level error encountered during ingest or extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Loader output: the table plus what had to be skipped.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Typed rows extracted from a table, plus rows that could not be typed.
#[derive(Debug, Clone)]
pub struct Extracted<T> {
    pub rows: Vec<T>,
    pub row_errors: Vec<RowError>,
}

/// Load a CSV file into a `Table`.
pub fn load_table(path: &Path, options: &LoadOptions) -> Result<LoadedTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let loaded = read_table(file, options)
        .map_err(|e| AppError::input(format!("{} ('{}')", e.message(), path.display())))?;
    info!(
        path = %path.display(),
        rows = loaded.table.len(),
        skipped = loaded.row_errors.len(),
        "loaded table"
    );
    Ok(loaded)
}

/// Read CSV data from any reader into a `Table`.
pub fn read_table<R: Read>(reader: R, options: &LoadOptions) -> Result<LoadedTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = reader.records();

    for _ in 0..options.skip_rows {
        match records.next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(AppError::input(format!("Failed to read CSV banner line: {e}"))),
            None => return Err(AppError::input("CSV ended before the header line.")),
        }
    }

    let header = match records.next() {
        Some(Ok(h)) => h,
        Some(Err(e)) => return Err(AppError::input(format!("Failed to read CSV headers: {e}"))),
        None => return Err(AppError::input("CSV has no header line.")),
    };
    let mut columns: Vec<String> = header.iter().map(normalize_header_name).collect();

    if let Some(rename) = &options.rename_columns {
        if rename.len() != columns.len() {
            return Err(AppError::input(format!(
                "Length mismatch: expected {} columns to rename, found {}.",
                rename.len(),
                columns.len()
            )));
        }
        debug!(from = ?columns, to = ?rename, "renaming columns");
        columns = rename.clone();
    }

    let width = columns.len();
    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for result in records {
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        let line = record_line(&record);

        if record.len() > width {
            row_errors.push(RowError {
                line,
                message: format!("Expected {width} fields, saw {}.", record.len()),
            });
            continue;
        }

        let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
        // Short records are padded with missing values.
        cells.resize(width, String::new());
        rows.push(Row { line, cells });
    }

    Ok(LoadedTable {
        table: Table::from_rows(columns, rows),
        row_errors,
        rows_read,
    })
}

fn record_line(record: &StringRecord) -> usize {
    record.position().map(|p| p.line() as usize).unwrap_or(0)
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, the expected-column check will
    // incorrectly report a missing column.
    name.trim().trim_start_matches('\u{feff}').trim().to_string()
}

/// Parse a calendar date from any of the formats seen in market extracts.
///
/// Date-times are accepted and truncated to their day.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if is_null(s) {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Parse a date and apply the day-of-month sanity check used by the cleaner.
pub fn parse_trading_date(s: &str) -> Option<NaiveDate> {
    parse_date(s).filter(|d| (1..=31).contains(&d.day()))
}

/// Parse a trading period (integral, 1..=48).
pub fn parse_period(s: &str) -> Option<u8> {
    let v = parse_number(s)?;
    if v.fract() != 0.0 || !is_valid_period(v) {
        return None;
    }
    Some(v as u8)
}

/// Extract typed offers from a merit-order table.
pub fn offers_from_table(table: &Table, roles: &ColumnRoles) -> Result<Extracted<OfferRow>, AppError> {
    let date = require_column(table, &roles.date)?;
    let period = require_column(table, &roles.period)?;
    let price = require_column(table, &roles.price)?;
    let volume = require_column(table, &roles.quantity)?;

    let mut rows = Vec::with_capacity(table.len());
    let mut row_errors = Vec::new();

    for row in table.rows() {
        let parsed = (|| {
            Ok::<_, String>(OfferRow {
                date: field(row, date, &roles.date, parse_date)?,
                period: field(row, period, &roles.period, parse_period)?,
                price: field(row, price, &roles.price, parse_number)?,
                volume: field(row, volume, &roles.quantity, parse_number)?,
            })
        })();
        match parsed {
            Ok(offer) => rows.push(offer),
            Err(message) => row_errors.push(RowError { line: row.line, message }),
        }
    }

    Ok(Extracted { rows, row_errors })
}

/// Extract typed settlement intervals from a settlement table.
///
/// `INFORMATION TYPE`, `LCP ($/MWh)` and `TCL (MW)` are optional.
pub fn settlements_from_table(table: &Table, roles: &ColumnRoles) -> Result<Extracted<SettlementRow>, AppError> {
    let date = require_column(table, &roles.date)?;
    let period = require_column(table, &roles.period)?;
    let price = require_column(table, &roles.price)?;
    let demand = require_column(table, &roles.quantity)?;
    let info = table.column_index(USEP_INFORMATION_TYPE);
    let lcp = table.column_index(USEP_LCP);
    let tcl = table.column_index(USEP_TCL);

    let mut rows = Vec::with_capacity(table.len());
    let mut row_errors = Vec::new();

    for row in table.rows() {
        let parsed = (|| {
            Ok::<_, String>(SettlementRow {
                information_type: info.map(|i| row.get(i)).filter(|s| !is_null(s)).map(str::to_string),
                date: field(row, date, &roles.date, parse_date)?,
                period: field(row, period, &roles.period, parse_period)?,
                clearing_price: field(row, price, &roles.price, parse_number)?,
                load_clearing_price: lcp.and_then(|i| parse_number(row.get(i))),
                demand: field(row, demand, &roles.quantity, parse_number)?,
                transmission_loss: tcl.and_then(|i| parse_number(row.get(i))),
            })
        })();
        match parsed {
            Ok(interval) => rows.push(interval),
            Err(message) => row_errors.push(RowError { line: row.line, message }),
        }
    }

    Ok(Extracted { rows, row_errors })
}

fn require_column(table: &Table, name: &str) -> Result<usize, AppError> {
    table
        .column_index(name)
        .ok_or_else(|| AppError::input(format!("Missing required column: `{name}`")))
}

fn field<T>(row: &Row, idx: usize, name: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T, String> {
    let cell = row.get(idx);
    if is_null(cell) {
        return Err(format!("Missing required value: `{name}`"));
    }
    parse(cell).ok_or_else(|| format!("Invalid `{name}` value '{cell}'."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MERIT_PRICE, MERIT_VOLUME};

    const MERIT_CSV: &str = "\
Delayed Offer Stacks
Energy,01-Jan-2023 to 31-Jan-2023
DATE,PERIOD,PRICE,CAPACITY
01 Jan 2023,1,-100,100
01 Jan 2023,1,0,200
01 Jan 2023,1,50,300,extra
01 Jan 2023,2
";

    #[test]
    fn merit_file_skips_banner_and_renames() {
        let loaded = read_table(MERIT_CSV.as_bytes(), &LoadOptions::for_kind(DatasetKind::Merit)).unwrap();
        let t = &loaded.table;
        assert_eq!(t.columns(), &MERIT_COLUMNS.map(String::from));
        assert_eq!(loaded.rows_read, 4);
        assert_eq!(t.len(), 3);
        assert_eq!(loaded.row_errors.len(), 1);
        assert_eq!(loaded.row_errors[0].line, 6);
        // Short record padded with missing values.
        assert_eq!(t.rows()[2].get(2), "");
        assert_eq!(t.rows()[0].line, 4);
    }

    #[test]
    fn rename_length_mismatch_is_an_error() {
        let csv = "a\nb\nDATE,PERIOD\n01 Jan 2023,1\n";
        let err = read_table(csv.as_bytes(), &LoadOptions::for_kind(DatasetKind::Merit)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Length mismatch"));
    }

    #[test]
    fn header_bom_is_stripped() {
        let csv = "\u{feff}DATE,PERIOD\n01 Jan 2023,1\n";
        let loaded = read_table(csv.as_bytes(), &LoadOptions::for_kind(DatasetKind::Settlement)).unwrap();
        assert_eq!(loaded.table.columns()[0], "DATE");
    }

    #[test]
    fn parse_date_accepts_mixed_formats() {
        let jan1 = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        for s in ["2023-01-01", "01 Jan 2023", "01-Jan-2023", "1 January 2023", "01/01/2023", "2023-01-01 00:30:00"] {
            assert_eq!(parse_date(s), Some(jan1), "{s}");
        }
        assert_eq!(parse_date("40 Jan 2023"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn ambiguous_numeric_dates_are_month_first() {
        let jan2 = NaiveDate::from_ymd_opt(2023, 1, 2);
        assert_eq!(parse_date("01/02/2023"), jan2);
        assert_eq!(parse_date("01-02-2023"), jan2);
        // No 31st month, so the day-first reading applies.
        assert_eq!(parse_date("31/01/2023"), NaiveDate::from_ymd_opt(2023, 1, 31));
        assert_eq!(parse_date("01/02/2023 10:30"), jan2);
    }

    #[test]
    fn parse_period_requires_integral_slot() {
        assert_eq!(parse_period("1"), Some(1));
        assert_eq!(parse_period("48.0"), Some(48));
        assert_eq!(parse_period("1.5"), None);
        assert_eq!(parse_period("49"), None);
        assert_eq!(parse_period("0"), None);
    }

    #[test]
    fn offers_extraction_reports_bad_rows() {
        let table = Table::from_strs(
            &MERIT_COLUMNS,
            &[
                &["2023-01-01", "1", "-100", "100"],
                &["2023-01-01", "x", "0", "200"],
                &["2023-01-01", "1", "", "300"],
            ],
        );
        let out = offers_from_table(&table, &ColumnRoles::for_kind(DatasetKind::Merit)).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].price, -100.0);
        assert_eq!(out.row_errors.len(), 2);
        assert_eq!(out.row_errors[1].line, 4);
        assert!(out.row_errors[1].message.contains(MERIT_PRICE));
    }

    #[test]
    fn offers_extraction_requires_columns() {
        let table = Table::from_strs(&["Date", "Period", MERIT_PRICE], &[]);
        let err = offers_from_table(&table, &ColumnRoles::for_kind(DatasetKind::Merit)).unwrap_err();
        assert!(err.to_string().contains(MERIT_VOLUME));
    }
}
