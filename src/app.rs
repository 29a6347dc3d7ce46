//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the tracing subscriber
//! - resolves the run configuration
//! - runs the pipeline and prints reports/plots
//! - writes optional exports

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::analyze_settlement;
use crate::cli::{AnalyzeArgs, CleanArgs, ClearArgs, Command, CompareArgs, InputArgs, RunArgs};
use crate::clearing::compare_with_settlement;
use crate::domain::{ConfigFile, DatasetKind, DateRange, RunConfig};
use crate::error::AppError;
use crate::report::{cleaning_summary, dataset_info};

pub mod pipeline;

use pipeline::PreparedDataset;

/// Entry point for the `merit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `merit` and `merit --merit x.csv ...` behave like `merit run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    init_logging(&cli.command.input().log_level);
    let ctx = Context::from_args(cli.command.input())?;

    match cli.command {
        Command::Validate(_) => handle_validate(&ctx),
        Command::Clean(args) => handle_clean(&ctx, &args),
        Command::Clear(args) => handle_clear(&ctx, &args),
        Command::Compare(args) => handle_compare(&ctx, &args),
        Command::Analyze(args) => handle_analyze(&ctx, &args),
        Command::Run(args) => handle_run(&ctx, &args),
    }
}

/// `RUST_LOG` wins; otherwise the `--log-level` filter. Logs go to stderr.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second install (e.g. in tests) is not an error.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Inputs and resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub merit: Option<PathBuf>,
    pub usep: Option<PathBuf>,
    pub config: RunConfig,
    pub merit_skip_rows: usize,
}

impl Context {
    pub fn from_args(args: &InputArgs) -> Result<Self, AppError> {
        let file = args.config.as_deref().map(ConfigFile::load).transpose()?;
        let window = match (args.start, args.end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end).ok_or_else(|| {
                AppError::input(format!("Reporting window starts after it ends ({start} > {end})."))
            })?),
            _ => None,
        };
        let config = RunConfig::resolve(file.as_ref(), window);
        info!(
            merit_window = ?config.merit.validation.date_range,
            settlement_window = ?config.settlement.validation.date_range,
            "configuration resolved"
        );

        Ok(Self {
            merit: args.merit.clone(),
            usep: args.usep.clone(),
            config,
            merit_skip_rows: args.merit_skip_rows,
        })
    }

    fn path(&self, kind: DatasetKind) -> Option<&Path> {
        match kind {
            DatasetKind::Merit => self.merit.as_deref(),
            DatasetKind::Settlement => self.usep.as_deref(),
        }
    }

    fn require(&self, kind: DatasetKind) -> Result<&Path, AppError> {
        self.path(kind).ok_or_else(|| {
            let (flag, env) = match kind {
                DatasetKind::Merit => ("--merit", "MERIT_CSV"),
                DatasetKind::Settlement => ("--usep", "USEP_CSV"),
            };
            AppError::input(format!(
                "No {} file given (use {flag} or set {env}).",
                kind.display_name()
            ))
        })
    }

    pub fn prepare(&self, kind: DatasetKind) -> Result<PreparedDataset, AppError> {
        pipeline::load_and_prepare(
            self.require(kind)?,
            kind,
            self.config.for_kind(kind),
            self.merit_skip_rows,
        )
    }

    /// Prepare every dataset whose path is known; at least one is required.
    fn prepare_available(&self) -> Result<Vec<PreparedDataset>, AppError> {
        let kinds: Vec<DatasetKind> = DatasetKind::ALL
            .into_iter()
            .filter(|k| self.path(*k).is_some())
            .collect();
        if kinds.is_empty() {
            return Err(AppError::input(
                "No input files given (use --merit/--usep or set MERIT_CSV/USEP_CSV).",
            ));
        }
        kinds.into_iter().map(|k| self.prepare(k)).collect()
    }
}

fn handle_validate(ctx: &Context) -> Result<(), AppError> {
    for dataset in ctx.prepare_available()? {
        print_validation(&dataset);
    }
    Ok(())
}

fn print_validation(dataset: &PreparedDataset) {
    println!("{}", crate::report::format_dataset_info(&dataset_info(dataset.raw(), dataset.kind)));
    println!("{}", crate::report::format_validation_report(&dataset.report, dataset.kind));
}

fn print_cleaning(dataset: &PreparedDataset) {
    let summary = cleaning_summary(dataset.raw(), &dataset.cleaned, dataset.stats, dataset.kind);
    println!("{}", crate::report::format_cleaning_summary(&summary));
}

fn handle_clean(ctx: &Context, args: &CleanArgs) -> Result<(), AppError> {
    for dataset in ctx.prepare_available()? {
        print_cleaning(&dataset);

        let export = match dataset.kind {
            DatasetKind::Merit => &args.export_merit,
            DatasetKind::Settlement => &args.export_usep,
        };
        if let Some(path) = export {
            crate::io::export::write_table_csv(path, &dataset.cleaned)?;
            info!(path = %path.display(), rows = dataset.cleaned.len(), "cleaned table exported");
        }
    }
    Ok(())
}

fn handle_clear(ctx: &Context, args: &ClearArgs) -> Result<(), AppError> {
    let dataset = ctx.prepare(DatasetKind::Merit)?;
    let offers = pipeline::extract_offers(&dataset, &ctx.config.merit)?;
    let outcome = pipeline::clear_interval(&offers, args.date, args.period, args.demand)?;

    println!(
        "{}",
        crate::report::format_clearing(&outcome.curve, args.demand, &outcome.marginal)
    );
    if args.plot {
        let plot = crate::plot::render_merit_order(
            &outcome.curve,
            Some(outcome.point),
            args.size.width,
            args.size.height,
        );
        println!("{plot}");
    }

    if let Some(path) = &args.export_curve {
        crate::io::curve::write_curve_json(path, &outcome.curve, Some(outcome.point))?;
    }
    if let Some(path) = &args.svg {
        crate::plot::write_merit_order_svg(path, &outcome.curve, Some(outcome.point))?;
    }
    Ok(())
}

fn handle_compare(ctx: &Context, args: &CompareArgs) -> Result<(), AppError> {
    let merit = ctx.prepare(DatasetKind::Merit)?;
    let usep = ctx.prepare(DatasetKind::Settlement)?;
    let offers = pipeline::extract_offers(&merit, &ctx.config.merit)?;
    let settlements = pipeline::extract_settlements(&usep, &ctx.config.settlement)?;

    let run = compare_with_settlement(&offers, &settlements);
    println!("{}", crate::report::format_comparison(&run));

    if let Some(path) = &args.export {
        crate::io::export::write_comparison_csv(path, &run.comparisons)?;
    }
    Ok(())
}

fn handle_analyze(ctx: &Context, args: &AnalyzeArgs) -> Result<(), AppError> {
    let usep = ctx.prepare(DatasetKind::Settlement)?;
    let settlements = pipeline::extract_settlements(&usep, &ctx.config.settlement)?;

    let analysis = analyze_settlement(&settlements);
    println!("{}", crate::report::format_analysis(&analysis));

    if let Some(path) = &args.svg {
        crate::plot::write_price_demand_svg(path, &settlements, analysis.regression.as_ref())?;
    }
    Ok(())
}

/// The whole report in one go. A failed sample clearing is reported inline
/// and does not stop the statistics.
fn handle_run(ctx: &Context, args: &RunArgs) -> Result<(), AppError> {
    let merit = ctx.prepare(DatasetKind::Merit)?;
    let usep = ctx.prepare(DatasetKind::Settlement)?;

    println!("=== Data Validation ===\n");
    print_validation(&merit);
    print_validation(&usep);

    println!("=== Data Cleaning ===\n");
    print_cleaning(&merit);
    print_cleaning(&usep);

    println!("=== Merit Order Analysis ===\n");
    let offers = pipeline::extract_offers(&merit, &ctx.config.merit)?;
    match pipeline::clear_interval(&offers, args.sample_date, args.sample_period, args.sample_demand) {
        Ok(outcome) => {
            let plot = crate::plot::render_merit_order(
                &outcome.curve,
                Some(outcome.point),
                args.size.width,
                args.size.height,
            );
            println!("{plot}");
            println!(
                "{}",
                crate::report::format_clearing(&outcome.curve, args.sample_demand, &outcome.marginal)
            );
        }
        Err(err) => {
            warn!(
                date = %args.sample_date,
                period = args.sample_period,
                demand = args.sample_demand,
                "sample clearing failed"
            );
            println!("Sample clearing price calculation failed: {err}\n");
        }
    }

    println!("=== Statistical Analysis ===\n");
    let settlements = pipeline::extract_settlements(&usep, &ctx.config.settlement)?;
    println!("{}", crate::report::format_analysis(&analyze_settlement(&settlements)));
    Ok(())
}

/// Rewrite argv so `merit` defaults to `merit run`.
///
/// Rules:
/// - `merit`                      -> `merit run`
/// - `merit --merit m.csv ...`    -> `merit run --merit m.csv ...`
/// - `merit --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    // If the first token is a flag, treat it as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
    }
    argv
}
