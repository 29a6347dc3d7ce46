//! Formatted terminal output for every result type.
//!
//! Formatting lives in one place so the validation, clearing and statistics
//! code never prints, and output changes stay localized for snapshot tests.

use crate::analysis::{MarketAnalysis, SeriesStats};
use crate::clearing::{ComparisonRun, CurveStep, MeritOrderCurve};
use crate::domain::{DatasetKind, Row};
use crate::math::Summary;
use crate::validate::ValidationReport;

use super::{CleaningSummary, DatasetInfo};

/// Examples shown per finding; reports keep more.
const SHOWN_EXAMPLES: usize = 3;

pub fn format_dataset_info(info: &DatasetInfo) -> String {
    let mut out = String::new();

    out.push_str(&format!("{} Dataset Summary:\n", info.kind.display_name()));
    out.push_str("------------------------\n");
    out.push_str(&format!("Total rows: {}\n", info.row_count));
    match info.date_range {
        Some((min, max)) => out.push_str(&format!("Date range: {min} to {max}\n")),
        None => out.push_str("Date range: n/a\n"),
    }

    out.push_str("\nColumn Statistics:\n");
    if info.columns.is_empty() {
        out.push_str("  (no numeric columns)\n");
        return out;
    }
    out.push_str(&summary_table(&info.columns));
    out
}

fn summary_table(columns: &[(String, Summary)]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<40} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}\n",
            "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )
        .trim_end(),
    );
    out.push('\n');
    for (name, s) in columns {
        out.push_str(
            format!(
                "{:<40} {:>8} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}\n",
                truncate(name, 40),
                s.count,
                s.mean,
                s.std,
                s.min,
                s.q25,
                s.median,
                s.q75,
                s.max
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Validation findings with domain context, one section per finding class.
pub fn format_validation_report(report: &ValidationReport, kind: DatasetKind) -> String {
    let mut out = String::new();

    out.push_str(&format!("{} Validation Results:\n", kind.display_name()));
    out.push_str(&"=".repeat(50));
    out.push('\n');

    if !report.issues_found {
        out.push_str("No issues found - all data within expected bounds\n");
        return out;
    }

    if !report.missing_columns.is_empty() {
        let cols: Vec<&str> = report.missing_columns.iter().map(String::as_str).collect();
        out.push_str(&format!("\nMissing columns: {}\n", cols.join(", ")));
    }

    if !report.data_types.is_empty() {
        out.push_str("\nData Type Issues:\n");
        for (col, issue) in &report.data_types {
            out.push_str(&format!("  {col}: {issue}\n"));
        }
    }

    if !report.domain_violations.is_empty() {
        out.push_str("\nDomain Constraint Violations:\n");
        for (col, info) in &report.domain_violations {
            out.push_str(&format!("\n{col}:\n"));
            let description = if info.bounds.description.is_empty() {
                "No description available"
            } else {
                info.bounds.description.as_str()
            };
            out.push_str(&format!("  Description: {description}\n"));
            out.push_str(&format!(
                "  Violations found: {} ({:.2}%)\n",
                info.violations_count, info.violation_percentage
            ));
            out.push_str(&format!(
                "  Expected range ({}): {} to {}\n",
                info.bound_kind.label(),
                info.bounds.min,
                info.bounds.max
            ));
            out.push_str(&format!(
                "  Actual range: {:.2} to {:.2}\n",
                info.summary_stats.min, info.summary_stats.max
            ));
            if !info.violation_examples.is_empty() {
                let shown: Vec<String> = info
                    .violation_examples
                    .iter()
                    .take(SHOWN_EXAMPLES)
                    .map(|v| v.to_string())
                    .collect();
                out.push_str(&format!("  Sample violations: [{}]\n", shown.join(", ")));
            }
        }
    }

    if !report.missing_values.is_empty() {
        out.push_str("\nMissing Values:\n");
        for (col, count) in &report.missing_values {
            out.push_str(&format!("  {col}: {count}\n"));
        }
    }

    if report.duplicate_row_count > 0 {
        out.push_str(&format!("\nDuplicate rows: {}\n", report.duplicate_row_count));
    }

    if !report.date_violations.is_empty() {
        out.push_str("\nDate Violations:\n");
        for (col, info) in &report.date_violations {
            out.push_str(&format!("\n{col}:\n"));
            out.push_str(&format!(
                "  Total violations: {} ({:.2}%)\n",
                info.total_violations, info.violation_percentage
            ));
            if info.invalid_format.count > 0 {
                out.push_str(&format!(
                    "  Invalid format examples: {}\n",
                    quoted(&info.invalid_format.values)
                ));
                out.push_str(&format!("  Invalid format rows: {}\n", lines(&info.invalid_format.rows)));
            }
            if info.out_of_range.count > 0 {
                out.push_str(&format!(
                    "  Out of range date examples: {}\n",
                    quoted(&info.out_of_range.values)
                ));
                out.push_str(&format!("  Out of range date rows: {}\n", lines(&info.out_of_range.rows)));
            }
        }
    }

    out
}

pub fn format_cleaning_summary(summary: &CleaningSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("{} Cleaning Summary:\n", summary.kind.display_name()));
    out.push_str(&format!("Original rows: {}\n", summary.original_rows));
    out.push_str(&format!("Cleaned rows: {}\n", summary.cleaned_rows));
    out.push_str(&format!(
        "Removed rows: {} ({:.2}%)\n",
        summary.removed_rows(),
        summary.removed_percentage()
    ));

    let s = &summary.stats;
    if s.missing_columns > 0 {
        out.push_str(&format!(
            "  required columns missing: all {} rows dropped\n",
            s.missing_columns
        ));
    } else if s.total() > 0 {
        out.push_str(&format!(
            "  invalid dates={} | invalid periods={} | outside window={} | out of bounds={}\n",
            s.invalid_dates, s.invalid_periods, s.outside_window, s.out_of_bounds
        ));
    }

    if summary.sample.is_empty() {
        out.push_str("Sample data after cleaning: (empty)\n");
        return out;
    }
    out.push_str("Sample data after cleaning:\n");
    out.push_str(&format!("  {:>6}  {}\n", "line", summary.columns.join(" | ")));
    for row in &summary.sample {
        out.push_str(&format!("  {:>6}  {}\n", row.line, row.cells.join(" | ")));
    }
    out
}

/// Clearing result for one interval and demand.
pub fn format_clearing(curve: &MeritOrderCurve, demand: f64, step: &CurveStep) -> String {
    let mut out = String::new();

    out.push_str("Clearing price calculation:\n");
    out.push_str(&format!(
        "Interval: {} (date {}, period {})\n",
        curve.interval_start().format("%Y-%m-%d %H:%M"),
        curve.date,
        curve.period
    ));
    out.push_str(&format!(
        "Offers: {} | total volume {:.2} MW | price [{:.2}, {:.2}] $/MWh\n",
        curve.steps().len(),
        curve.total_volume(),
        curve.min_price(),
        curve.max_price()
    ));
    out.push_str(&format!("Demand: {demand} MW\n"));
    out.push_str(&format!("Calculated clearing price: {} $/MWh\n", step.price));
    out.push_str(&format!(
        "Marginal offer: {:.2} MW (cumulative {:.2} MW)\n",
        step.volume, step.cumulative_volume
    ));
    out
}

pub fn format_comparison(run: &ComparisonRun) -> String {
    let mut out = String::new();

    out.push_str("Price Comparison Summary:\n");
    out.push_str(&format!(
        "Intervals: {} attempted | {} cleared | {} without offers | {} demand above supply\n",
        run.attempted(),
        run.comparisons.len(),
        run.not_found_count(),
        run.out_of_range_count()
    ));

    let mut columns = Vec::new();
    if let Some(s) = run.actual_summary() {
        columns.push(("actual_usep".to_string(), s));
    }
    if let Some(s) = run.calculated_summary() {
        columns.push(("calculated_price".to_string(), s));
    }
    if !columns.is_empty() {
        out.push('\n');
        out.push_str(&summary_table(&columns));
    }

    match run.mean_absolute_error() {
        Some(mae) => out.push_str(&format!("\nMean Absolute Error: {mae:.2} $/MWh\n")),
        None => out.push_str("\nMean Absolute Error: n/a (no intervals cleared)\n"),
    }
    out
}

pub fn format_analysis(analysis: &MarketAnalysis) -> String {
    let mut out = String::new();

    out.push_str("=== Energy Market Statistical Analysis ===\n");
    out.push_str(&format!("Observations: {}\n", analysis.observations));

    out.push_str("\n1. Daily Statistics:\n");
    if analysis.daily.is_empty() {
        out.push_str("  (no data)\n");
    } else {
        out.push_str(
            format!(
                "{:<10}  {:>9} {:>9} {:>9} {:>9}  {:>9} {:>9} {:>9} {:>9}\n",
                "date", "dem_mean", "dem_std", "dem_min", "dem_max", "usep_mean", "usep_std", "usep_min", "usep_max"
            )
            .trim_end(),
        );
        out.push('\n');
        for d in &analysis.daily {
            out.push_str(
                format!("{:<10}  {}  {}\n", d.date, series_cells(&d.demand), series_cells(&d.usep)).trim_end(),
            );
            out.push('\n');
        }
    }

    out.push_str("\n2. Correlation (demand vs USEP):\n");
    out.push_str(&format!("Pearson r: {}\n", opt4(analysis.correlation)));

    out.push_str("\n3. Price Elasticity of Demand:\n");
    out.push_str(&format!("Average elasticity: {}\n", opt4(analysis.elasticity)));

    out.push_str(&format!(
        "\n4. Peak vs Off-Peak Demand Test (peak n={}, off-peak n={}):\n",
        analysis.peak_count, analysis.offpeak_count
    ));
    match analysis.peak_vs_offpeak {
        Some(t) => {
            out.push_str(&format!("t-statistic: {:.4}\n", t.statistic));
            out.push_str(&format!("p-value: {:.4}\n", t.p_value));
            if t.is_significant() {
                out.push_str("Conclusion: Significant difference between peak and off-peak demand\n");
            } else {
                out.push_str("Conclusion: No significant difference between peak and off-peak demand\n");
            }
        }
        None => out.push_str("Not enough data for a t-test.\n"),
    }
    match analysis.mann_whitney {
        Some(mw) => out.push_str(&format!(
            "Mann-Whitney U: {:.1} (z={:.4}, p={:.4})\n",
            mw.u, mw.z, mw.p_value
        )),
        None => out.push_str("Mann-Whitney U: n/a\n"),
    }

    out.push_str("\n5. USEP Normality (Jarque-Bera):\n");
    match analysis.normality {
        Some(jb) => out.push_str(&format!(
            "JB={:.4} skew={:.4} kurtosis={:.4} p-value={:.4}\n",
            jb.statistic, jb.skewness, jb.kurtosis, jb.p_value
        )),
        None => out.push_str("n/a\n"),
    }

    out.push_str("\n6. Regression USEP ~ demand:\n");
    match analysis.regression {
        Some(fit) => out.push_str(&format!(
            "USEP = {:.4} + {:.6} * demand | R²={:.4} RMSE={:.2} (n={})\n",
            fit.intercept, fit.slope, fit.r_squared, fit.rmse, fit.n
        )),
        None => out.push_str("n/a\n"),
    }

    out
}

fn series_cells(s: &SeriesStats) -> String {
    format!("{:>9.2} {:>9.2} {:>9.2} {:>9.2}", s.mean, s.std, s.min, s.max)
}

fn opt4(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "n/a".to_string())
}

fn quoted(values: &[String]) -> String {
    let shown: Vec<String> = values.iter().take(SHOWN_EXAMPLES).map(|v| format!("'{v}'")).collect();
    format!("[{}]", shown.join(", "))
}

fn lines(rows: &[Row]) -> String {
    let shown: Vec<String> = rows.iter().take(SHOWN_EXAMPLES).map(|r| r.line.to_string()).collect();
    format!("lines {}", shown.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
