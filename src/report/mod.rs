//! Reporting utilities: dataset summaries, cleaning summaries, and formatted
//! terminal output.

use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::clean::CleanStats;
use crate::domain::{ColumnRoles, DatasetKind, Row, Table};
use crate::io::ingest::parse_date;
use crate::math::{Summary, describe};

pub mod format;

pub use format::*;

/// Rows shown in the post-cleaning sample.
pub const SAMPLE_ROWS: usize = 5;

/// Seed for the post-cleaning sample so reruns print the same rows.
pub const SAMPLE_SEED: u64 = 42;

/// Row count, date span and per-column statistics of a loaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub kind: DatasetKind,
    pub row_count: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Every fully numeric column, in table order.
    pub columns: Vec<(String, Summary)>,
}

pub fn dataset_info(table: &Table, kind: DatasetKind) -> DatasetInfo {
    let roles = ColumnRoles::for_kind(kind);

    let date_range = table.column_values(&roles.date).and_then(|values| {
        let dates: Vec<NaiveDate> = values.into_iter().filter_map(parse_date).collect();
        Some((*dates.iter().min()?, *dates.iter().max()?))
    });

    let columns = table
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            let values: Vec<f64> = table.numeric_column(idx).ok()?.into_iter().flatten().collect();
            Some((name.clone(), describe(&values)?))
        })
        .collect();

    DatasetInfo {
        kind,
        row_count: table.len(),
        date_range,
        columns,
    }
}

/// Before/after view of one cleaning run.
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningSummary {
    pub kind: DatasetKind,
    pub original_rows: usize,
    pub cleaned_rows: usize,
    pub stats: CleanStats,
    pub columns: Vec<String>,
    /// Up to `SAMPLE_ROWS` cleaned rows, in table order.
    pub sample: Vec<Row>,
}

impl CleaningSummary {
    pub fn removed_rows(&self) -> usize {
        self.original_rows.saturating_sub(self.cleaned_rows)
    }

    pub fn removed_percentage(&self) -> f64 {
        if self.original_rows == 0 {
            return 0.0;
        }
        self.removed_rows() as f64 / self.original_rows as f64 * 100.0
    }
}

pub fn cleaning_summary(original: &Table, cleaned: &Table, stats: CleanStats, kind: DatasetKind) -> CleaningSummary {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let amount = SAMPLE_ROWS.min(cleaned.len());
    let mut picked = rand::seq::index::sample(&mut rng, cleaned.len(), amount).into_vec();
    picked.sort_unstable();

    CleaningSummary {
        kind,
        original_rows: original.len(),
        cleaned_rows: cleaned.len(),
        stats,
        columns: cleaned.columns().to_vec(),
        sample: picked.into_iter().map(|i| cleaned.rows()[i].clone()).collect(),
    }
}
