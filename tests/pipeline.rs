//! End-to-end run over small extracts written to a temp directory.

use std::path::PathBuf;

use chrono::NaiveDate;
use merit_order::analysis::analyze_settlement;
use merit_order::app::pipeline::{clear_interval, extract_offers, extract_settlements, load_and_prepare};
use merit_order::clearing::{ClearingError, compare_with_settlement};
use merit_order::domain::{DatasetKind, RunConfig};
use merit_order::error::AppError;
use merit_order::io::export::{write_comparison_csv, write_table_csv};
use merit_order::io::ingest::{LoadOptions, load_table};
use merit_order::report::{format_analysis, format_comparison, format_validation_report};

const MERIT_CSV: &str = "\
Merit Order Offer Stack
Trading Date: 01 Jan 2023
Date,Period,Lowest to Highest Offer Price ($/MWh),Total Offer Capacity At Specified Offer Price (MW)
01 Jan 2023,1,50,1500
01 Jan 2023,1,-100,2000
01 Jan 2023,1,120,1000
01 Jan 2023,1,0,2000
01 Jan 2023,2,10,2000
01 Jan 2023,2,150,1000
01 Jan 2023,2,80,2000
01 Jan 2023,3,20,2000
01 Jan 2023,3,40,2000
01 Jan 2023,3,60,1000
01 Feb 2023,1,10,100
01 Jan 2023,4,10,2500
";

const USEP_CSV: &str = "\
INFORMATION TYPE,DATE,PERIOD,USEP ($/MWh),LCP ($/MWh),DEMAND (MW),TCL (MW)
Final,2023-01-01,1,60,61,5400,20
Final,2023-01-01,2,95,96,5200,20
Final,2023-01-01,3,90,91,4500,20
Final,2023-01-01,4,70,71,4800,20
Final,2023-01-01,5,70,71,9000,20
";

fn fixture(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn extracts_flow_through_validation_cleaning_and_clearing() {
    let dir = tempfile::tempdir().unwrap();
    let merit_path = fixture(&dir, "merit.csv", MERIT_CSV);
    let usep_path = fixture(&dir, "usep.csv", USEP_CSV);
    let config = RunConfig::default();

    let merit = load_and_prepare(&merit_path, DatasetKind::Merit, &config.merit, 2).unwrap();
    let usep = load_and_prepare(&usep_path, DatasetKind::Settlement, &config.settlement, 2).unwrap();

    // February offer is outside the window; the 2500 MW offer breaks the volume bound.
    assert_eq!(merit.raw().len(), 12);
    assert_eq!(merit.cleaned.len(), 10);
    assert_eq!(merit.stats.outside_window, 1);
    assert_eq!(merit.stats.out_of_bounds, 1);
    assert!(merit.report.issues_found);

    // 9000 MW demand is outside the demand bound.
    assert_eq!(usep.cleaned.len(), 4);
    let text = format_validation_report(&usep.report, DatasetKind::Settlement);
    assert!(text.starts_with("USEP Data Validation Results:"));

    let offers = extract_offers(&merit, &config.merit).unwrap();
    let settlements = extract_settlements(&usep, &config.settlement).unwrap();
    assert_eq!(offers.len(), 10);
    assert_eq!(settlements.len(), 4);

    let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let outcome = clear_interval(&offers, date, 1, 5400.0).unwrap();
    assert_eq!(outcome.point.price, 50.0);
    assert_eq!(outcome.curve.total_volume(), 6500.0);

    let run = compare_with_settlement(&offers, &settlements);
    assert_eq!(run.attempted(), 4);
    assert_eq!(run.comparisons.len(), 2);
    assert_eq!(run.not_found_count(), 1);
    assert_eq!(run.out_of_range_count(), 1);
    assert!(run.failures.iter().any(|e| matches!(
        e,
        ClearingError::OutOfRange { period: 2, available, .. } if *available == 5000.0
    )));
    // |60 - 50| and |90 - 60|.
    assert!((run.mean_absolute_error().unwrap() - 20.0).abs() < 1e-12);
    assert!(format_comparison(&run).contains("Mean Absolute Error: 20.00 $/MWh"));

    let export = dir.path().join("comparison.csv");
    write_comparison_csv(&export, &run.comparisons).unwrap();
    let written = std::fs::read_to_string(&export).unwrap();
    assert_eq!(written.lines().count(), 3);
    assert!(written.lines().nth(1).unwrap().starts_with("2023-01-01 00:00,2023-01-01,1,"));

    let analysis = analyze_settlement(&settlements);
    assert_eq!(analysis.observations, 4);
    assert_eq!(analysis.daily.len(), 1);
    assert!(analysis.regression.is_some());
    assert!(format_analysis(&analysis).contains("Observations: 4"));
}

#[test]
fn cleaned_export_is_stable_when_cleaned_again() {
    let dir = tempfile::tempdir().unwrap();
    let usep_path = fixture(&dir, "usep.csv", USEP_CSV);
    let config = RunConfig::default();

    let first = load_and_prepare(&usep_path, DatasetKind::Settlement, &config.settlement, 2).unwrap();
    let cleaned_path = dir.path().join("usep_clean.csv");
    write_table_csv(&cleaned_path, &first.cleaned).unwrap();

    let reloaded = load_table(&cleaned_path, &LoadOptions::for_kind(DatasetKind::Settlement)).unwrap();
    assert_eq!(reloaded.table.len(), first.cleaned.len());

    let second = load_and_prepare(&cleaned_path, DatasetKind::Settlement, &config.settlement, 2).unwrap();
    assert_eq!(second.cleaned.len(), first.cleaned.len());
    assert_eq!(second.stats.total(), 0);
}

#[test]
fn demand_beyond_supply_is_a_calculation_error() {
    let dir = tempfile::tempdir().unwrap();
    let merit_path = fixture(&dir, "merit.csv", MERIT_CSV);
    let config = RunConfig::default();

    let merit = load_and_prepare(&merit_path, DatasetKind::Merit, &config.merit, 2).unwrap();
    let offers = extract_offers(&merit, &config.merit).unwrap();
    let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

    let err = clear_interval(&offers, date, 3, 5000.5).unwrap_err();
    assert_eq!(err.exit_code(), AppError::CALCULATION);
    assert!(clear_interval(&offers, date, 3, 5000.0).is_ok());
}
