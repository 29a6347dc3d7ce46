//! In-memory tabular extract.
//!
//! A `Table` keeps every cell as trimmed text, exactly as read from the CSV.
//! Typing happens on demand (`numeric_column`, `io::ingest::parse_date`) so the
//! validator can report non-numeric columns and unparseable dates instead of
//! failing at load time.

use std::collections::HashSet;

use serde::Serialize;

/// Cell spellings treated as missing values.
const NULL_TOKENS: [&str; 9] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "#N/A", "None"];

/// One data record plus the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub line: usize,
    pub cells: Vec<String>,
}

impl Row {
    pub fn get(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table from plain records; line numbers assume a single header line.
    pub fn new(columns: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(idx, cells)| Row { line: idx + 2, cells })
            .collect();
        Self::from_rows(columns, rows)
    }

    /// Convenience constructor for literals (mostly tests and fixtures).
    pub fn from_strs(columns: &[&str], records: &[&[&str]]) -> Self {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            records
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Same columns, no rows.
    pub fn empty_like(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Raw cell values of a column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.get(idx)).collect())
    }

    /// Number of missing cells in a column.
    pub fn null_count(&self, idx: usize) -> usize {
        self.rows.iter().filter(|r| is_null(r.get(idx))).count()
    }

    /// Parse a column as numbers, keeping missing cells as `None`.
    ///
    /// Returns `Err(value)` with the first non-numeric cell when the column is
    /// not numeric as a whole.
    pub fn numeric_column(&self, idx: usize) -> Result<Vec<Option<f64>>, String> {
        self.rows
            .iter()
            .map(|r| {
                let cell = r.get(idx);
                if is_null(cell) {
                    return Ok(None);
                }
                parse_number(cell).map(Some).ok_or_else(|| cell.to_string())
            })
            .collect()
    }

    /// Keep rows for which `keep` returns true.
    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Row) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|&r| keep(r)).cloned().collect(),
        }
    }

    /// Rewrite every cell of one column.
    pub fn map_column<F>(mut self, idx: usize, mut f: F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        for row in &mut self.rows {
            if let Some(cell) = row.cells.get_mut(idx) {
                *cell = f(cell);
            }
        }
        self
    }

    /// Rows that exactly repeat an earlier row (all cells equal).
    pub fn duplicate_count(&self) -> usize {
        let mut seen: HashSet<&[String]> = HashSet::with_capacity(self.rows.len());
        self.rows
            .iter()
            .filter(|r| !seen.insert(r.cells.as_slice()))
            .count()
    }
}

pub fn is_null(cell: &str) -> bool {
    NULL_TOKENS.contains(&cell.trim())
}

/// Parse a finite number; missing or malformed cells give `None`.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if is_null(cell) {
        return None;
    }
    let v = cell.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_strs(
            &["DATE", "PERIOD", "DEMAND (MW)"],
            &[
                &["01 Jan 2023", "1", "5000"],
                &["01 Jan 2023", "2", ""],
                &["01 Jan 2023", "1", "5000"],
                &["02 Jan 2023", "x", "NaN"],
            ],
        )
    }

    #[test]
    fn counts_nulls_and_duplicates() {
        let t = sample();
        assert_eq!(t.null_count(2), 2);
        assert_eq!(t.null_count(0), 0);
        assert_eq!(t.duplicate_count(), 1);
    }

    #[test]
    fn numeric_column_reports_first_bad_cell() {
        let t = sample();
        assert_eq!(t.numeric_column(1), Err("x".to_string()));
        let demand = t.numeric_column(2).unwrap();
        assert_eq!(demand, vec![Some(5000.0), None, Some(5000.0), None]);
    }

    #[test]
    fn filter_keeps_columns_and_lines() {
        let t = sample().filter(|r| r.get(1) == "1");
        assert_eq!(t.len(), 2);
        assert_eq!(t.columns().len(), 3);
        assert_eq!(t.rows()[1].line, 4);
    }
}
