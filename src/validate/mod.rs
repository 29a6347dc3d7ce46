//! Read-only audit of a market extract.
//!
//! `validate` runs every configured check and accumulates findings into a
//! `ValidationReport`. Nothing here fails on bad data: a bad cell, a missing
//! column or an unparseable date is recorded and the remaining checks still
//! run. The input table is never modified.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::domain::{Bound, BoundKind, DateRange, Row, Table, ValidationConfig};
use crate::io::ingest::parse_date;
use crate::math::{Summary, describe};

/// Offending rows kept per violation class. Counts always cover every row.
pub const ROW_SAMPLE_LIMIT: usize = 10;

/// Example values kept per domain violation.
pub const VIOLATION_EXAMPLE_LIMIT: usize = 5;

/// One class of date problems in one column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViolationSample {
    pub count: usize,
    /// Offending cell values (capped).
    pub values: Vec<String>,
    /// Offending rows (capped).
    pub rows: Vec<Row>,
}

impl ViolationSample {
    fn push(&mut self, value: &str, row: &Row) {
        self.count += 1;
        if self.rows.len() < ROW_SAMPLE_LIMIT {
            self.values.push(value.to_string());
            self.rows.push(row.clone());
        }
    }
}

/// Date findings for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateViolation {
    pub invalid_format: ViolationSample,
    pub out_of_range: ViolationSample,
    pub total_violations: usize,
    /// Share of all rows, in percent.
    pub violation_percentage: f64,
}

/// Domain-bound findings for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainViolation {
    pub bound_kind: BoundKind,
    pub bounds: Bound,
    pub violations_count: usize,
    pub violation_percentage: f64,
    pub violation_examples: Vec<f64>,
    /// Statistics of the whole column, not just the violations.
    pub summary_stats: Summary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub row_count: usize,
    pub missing_columns: BTreeSet<String>,
    pub missing_values: BTreeMap<String, usize>,
    /// Columns whose values could not be interpreted as the expected type.
    pub data_types: BTreeMap<String, String>,
    pub date_violations: BTreeMap<String, DateViolation>,
    pub domain_violations: BTreeMap<String, DomainViolation>,
    pub duplicate_row_count: usize,
    pub issues_found: bool,
}

impl ValidationReport {
    fn any_findings(&self) -> bool {
        !self.missing_columns.is_empty()
            || !self.missing_values.is_empty()
            || !self.data_types.is_empty()
            || !self.date_violations.is_empty()
            || !self.domain_violations.is_empty()
            || self.duplicate_row_count > 0
    }
}

/// Run all configured checks over `table`.
pub fn validate(table: &Table, config: &ValidationConfig) -> ValidationReport {
    let mut report = ValidationReport {
        row_count: table.len(),
        ..ValidationReport::default()
    };

    report.missing_columns = config
        .expected_columns
        .iter()
        .filter(|c| !table.has_column(c))
        .cloned()
        .collect();

    for (idx, col) in table.columns().iter().enumerate() {
        let nulls = table.null_count(idx);
        if nulls > 0 {
            report.missing_values.insert(col.clone(), nulls);
        }
    }

    if let Some(range) = config.date_range {
        for col in &config.date_columns {
            match check_dates(table, col, range) {
                Ok(Some(violation)) => {
                    report.date_violations.insert(col.clone(), violation);
                }
                Ok(None) => {}
                Err(issue) => {
                    report.data_types.insert(col.clone(), issue);
                }
            }
        }
    }

    for col in &config.numeric_columns {
        let Some(idx) = table.column_index(col) else {
            continue;
        };
        let values = match table.numeric_column(idx) {
            Ok(values) => values,
            Err(bad) => {
                debug!(column = %col, example = %bad, "non-numeric column");
                report.data_types.insert(col.clone(), "Non-numeric data".to_string());
                continue;
            }
        };
        let Some((kind, bound)) = config.bounds.for_column(col) else {
            debug!(column = %col, "no bound kind matched; domain check skipped");
            continue;
        };
        let values: Vec<f64> = values.into_iter().flatten().collect();
        if let Some(violation) = check_domain(&values, table.len(), kind, bound) {
            report.domain_violations.insert(col.clone(), violation);
        }
    }

    report.duplicate_row_count = table.duplicate_count();
    report.issues_found = report.any_findings();

    debug!(
        rows = report.row_count,
        issues = report.issues_found,
        "validation finished"
    );
    report
}

fn check_dates(table: &Table, col: &str, range: DateRange) -> Result<Option<DateViolation>, String> {
    let idx = table
        .column_index(col)
        .ok_or_else(|| "Invalid date format: column not present".to_string())?;

    let mut invalid_format = ViolationSample::default();
    let mut out_of_range = ViolationSample::default();

    for row in table.rows() {
        let cell = row.get(idx);
        match parse_date(cell) {
            None => invalid_format.push(cell, row),
            Some(d) if !range.contains(d) => out_of_range.push(cell, row),
            Some(_) => {}
        }
    }

    let total_violations = invalid_format.count + out_of_range.count;
    if total_violations == 0 {
        return Ok(None);
    }
    debug!(
        column = %col,
        invalid = invalid_format.count,
        out_of_range = out_of_range.count,
        "date violations"
    );

    Ok(Some(DateViolation {
        invalid_format,
        out_of_range,
        total_violations,
        violation_percentage: percentage(total_violations, table.len()),
    }))
}

fn check_domain(values: &[f64], row_count: usize, kind: BoundKind, bound: &Bound) -> Option<DomainViolation> {
    let violations: Vec<f64> = values.iter().copied().filter(|v| !bound.contains(*v)).collect();
    if violations.is_empty() {
        return None;
    }
    let summary_stats = describe(values)?;

    Some(DomainViolation {
        bound_kind: kind,
        bounds: bound.clone(),
        violations_count: violations.len(),
        violation_percentage: percentage(violations.len(), row_count),
        violation_examples: violations.into_iter().take(VIOLATION_EXAMPLE_LIMIT).collect(),
        summary_stats,
    })
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
