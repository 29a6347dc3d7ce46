//! Merit-order curve JSON.
//!
//! The JSON is the portable form of one interval's supply curve: the sorted
//! steps with cumulative volume plus, when a demand was given, the clearing
//! point.

use std::fs::File;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::clearing::{ClearingPoint, CurveStep, MeritOrderCurve};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct CurveFile<'a> {
    pub tool: &'static str,
    pub date: NaiveDate,
    pub period: u8,
    pub interval_start: NaiveDateTime,
    pub total_volume: f64,
    pub steps: &'a [CurveStep],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearing: Option<ClearingPoint>,
}

impl<'a> CurveFile<'a> {
    pub fn new(curve: &'a MeritOrderCurve, clearing: Option<ClearingPoint>) -> Self {
        Self {
            tool: "merit",
            date: curve.date,
            period: curve.period,
            interval_start: curve.interval_start(),
            total_volume: curve.total_volume(),
            steps: curve.steps(),
            clearing,
        }
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, curve: &MeritOrderCurve, clearing: Option<ClearingPoint>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create curve JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &CurveFile::new(curve, clearing))
        .map_err(|e| AppError::input(format!("Failed to write curve JSON: {e}")))?;

    Ok(())
}
