//! Command-line parsing for the merit-order toolkit.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! validation/clearing code. `app` turns these structs into configuration.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::io::ingest::parse_date;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "merit",
    version,
    about = "Merit-order data validation, cleaning and clearing-price calculation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate both extracts and print dataset summaries and findings.
    Validate(InputArgs),
    /// Clean both extracts and print before/after summaries.
    Clean(CleanArgs),
    /// Compute the clearing price for one interval and demand.
    Clear(ClearArgs),
    /// Recompute every settlement interval's price and compare with USEP.
    Compare(CompareArgs),
    /// Statistical analysis of the settlement series.
    Analyze(AnalyzeArgs),
    /// Full pipeline: validate, clean, sample curve + clearing price, statistics.
    ///
    /// This is the default when `merit` is started without a subcommand.
    Run(RunArgs),
}

/// Input files and configuration shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Merit-order offers CSV.
    #[arg(long, env = "MERIT_CSV", value_name = "CSV")]
    pub merit: Option<PathBuf>,

    /// Settlement (USEP) CSV.
    #[arg(long, env = "USEP_CSV", value_name = "CSV")]
    pub usep: Option<PathBuf>,

    /// JSON file overriding columns, bounds and date window per dataset.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// First day of the reporting window (both datasets).
    #[arg(long, value_parser = parse_cli_date, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Last day of the reporting window (both datasets).
    #[arg(long, value_parser = parse_cli_date, requires = "start")]
    pub end: Option<NaiveDate>,

    /// Banner lines above the header in the merit-order file.
    #[arg(long, default_value_t = 2)]
    pub merit_skip_rows: usize,

    /// Log filter used when RUST_LOG is not set (error, warn, info, debug, trace).
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Args, Clone)]
pub struct CleanArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Write the cleaned merit-order table to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_merit: Option<PathBuf>,

    /// Write the cleaned settlement table to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_usep: Option<PathBuf>,
}

/// Terminal plot size.
#[derive(Debug, Args, Clone, Copy)]
pub struct PlotSize {
    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ClearArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Trading date.
    #[arg(long, value_parser = parse_cli_date)]
    pub date: NaiveDate,

    /// Trading period (1-48).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=48))]
    pub period: u8,

    /// Demand to clear (MW).
    #[arg(long)]
    pub demand: f64,

    /// Render the merit-order curve as an ASCII plot.
    #[arg(long)]
    pub plot: bool,

    #[command(flatten)]
    pub size: PlotSize,

    /// Export the curve (steps + clearing point) to JSON.
    #[arg(long = "export-curve", value_name = "JSON")]
    pub export_curve: Option<PathBuf>,

    /// Export the curve chart to SVG.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Write the per-interval comparison to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Export the price-vs-demand scatter to SVG.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Date of the sample curve and clearing calculation.
    #[arg(long, value_parser = parse_cli_date, default_value = "2023-01-01")]
    pub sample_date: NaiveDate,

    /// Period of the sample curve and clearing calculation.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=48), default_value_t = 1)]
    pub sample_period: u8,

    /// Demand for the sample clearing calculation (MW).
    #[arg(long, default_value_t = 5400.0)]
    pub sample_demand: f64,

    #[command(flatten)]
    pub size: PlotSize,
}

impl Command {
    pub fn input(&self) -> &InputArgs {
        match self {
            Command::Validate(input) => input,
            Command::Clean(args) => &args.input,
            Command::Clear(args) => &args.input,
            Command::Compare(args) => &args.input,
            Command::Analyze(args) => &args.input,
            Command::Run(args) => &args.input,
        }
    }
}

fn parse_cli_date(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("unrecognized date '{s}' (try YYYY-MM-DD)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn clear_arguments_parse() {
        let cli = Cli::try_parse_from([
            "merit", "clear", "--merit", "m.csv", "--date", "01 Jan 2023", "--period", "3", "--demand", "5400",
            "--plot",
        ])
        .unwrap();
        let Command::Clear(args) = cli.command else {
            panic!("expected clear");
        };
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(args.period, 3);
        assert_eq!(args.demand, 5400.0);
        assert!(args.plot);
        assert_eq!(args.input.merit_skip_rows, 2);
    }

    #[test]
    fn period_outside_day_is_rejected() {
        let res = Cli::try_parse_from(["merit", "clear", "--date", "2023-01-01", "--period", "49", "--demand", "1"]);
        assert!(res.is_err());
    }

    #[test]
    fn window_needs_both_ends() {
        assert!(Cli::try_parse_from(["merit", "validate", "--start", "2023-01-01"]).is_err());
        let cli = Cli::try_parse_from(["merit", "validate", "--start", "2023-01-01", "--end", "2023-01-07"]).unwrap();
        assert_eq!(cli.command.input().end, NaiveDate::from_ymd_opt(2023, 1, 7));
    }
}
