//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initializes logging and `.env`
//! - parses CLI arguments
//! - loads the case series
//! - runs the fit and writes the plot
//! - prints the summary and writes optional exports

use std::path::Path;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, FitArgs, SampleArgs};
use crate::data::{CsvFile, DatasetProvider, RemoteCsv, SyntheticWaves, WaveOptions, default_wave_params, generate_waves};
use crate::domain::{ColumnSpec, FitConfig, ParamBounds, PlotConfig, SeedOptions, SolverOptions, SourceKind};
use crate::error::AppError;
use crate::io::{build_fit_file, parse_timestamp, write_fit_json, write_series_csv};
use crate::report::{format_run_summary, summary_lines};

pub mod pipeline;

/// Label of generated series.
const SYNTHETIC_LABEL: &str = "SYN";

/// Entry point for the `epi` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    // `epi` and `epi --csv x.csv` behave like `epi fit ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Sample(args) => handle_sample(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let fit_config = fit_config_from_args(&args)?;
    let plot_config = plot_config_from_args(&args);
    let provider = provider_from_args(&args)?;

    let series = pipeline::load_series(provider.as_ref())?;
    let run = pipeline::fit_and_plot(&series, &fit_config, &plot_config)?;

    // Non-convergence was logged by the fitter; nothing to show.
    let Some(fit) = &run.fit else {
        return Ok(());
    };

    println!(
        "{}",
        format_run_summary(&series, fit, fit_config.fitted_days, run.image.as_deref())
    );

    if let Some(path) = &args.export_fit {
        let file = build_fit_file(
            &series,
            fit,
            fit_config.fitted_days,
            &fit_config.bounds,
            plot_config.curve_samples,
        );
        write_fit_json(path, &file)?;
        info!(path = %path.display(), "fit exported");
    }

    if plot_config.show {
        if let Some(overlay) = &run.overlay {
            crate::tui::show(overlay, &summary_lines(fit))?;
        }
    }

    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let start = parse_timestamp(&args.start)
        .ok_or_else(|| AppError::usage(format!("Invalid start date '{}'.", args.start)))?;
    let options = WaveOptions {
        params: default_wave_params(),
        days: args.days,
        step: args.step,
        noise: args.noise,
        seed: args.seed,
        start,
    };
    let series = generate_waves(SYNTHETIC_LABEL, &options)?;
    let columns = ColumnSpec {
        date: args.date_column.clone(),
        cases: args.cases_column.clone(),
    };
    write_series_csv(&args.output, &series, &columns)?;
    info!(path = %args.output.display(), rows = series.len(), "synthetic series written");
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let bounds = ParamBounds::new(
        (args.amplitude_min, args.amplitude_max),
        (args.offset_min, args.offset_max),
        (args.scale_min, args.scale_max),
    )?;
    let config = FitConfig {
        fitted_days: args.fitted_days,
        bounds,
        solver: SolverOptions {
            max_evals: args.max_evals,
            ftol: args.ftol,
            xtol: args.xtol,
            gtol: args.gtol,
        },
        seeds: SeedOptions {
            offset_steps: args.seed_offset_steps,
            scale_steps: args.seed_scale_steps,
            refine_top: args.refine_top,
        },
        min_r_squared: args.min_r_squared,
    };
    config.validate()?;
    Ok(config)
}

pub fn plot_config_from_args(args: &FitArgs) -> PlotConfig {
    PlotConfig {
        output: args.output.clone(),
        ymax: args.ymax,
        width: args.width,
        height: args.height,
        show: args.show,
        ..PlotConfig::default()
    }
}

pub fn columns_from_args(args: &FitArgs) -> ColumnSpec {
    ColumnSpec {
        date: args.date_column.clone(),
        cases: args.cases_column.clone(),
    }
}

/// Resolve the dataset provider.
///
/// Without `--source`, a given `--csv` selects the CSV source and the remote
/// national series is used otherwise.
pub fn provider_from_args(args: &FitArgs) -> Result<Box<dyn DatasetProvider>, AppError> {
    let source = args.source.unwrap_or(if args.csv.is_some() {
        SourceKind::Csv
    } else {
        SourceKind::Remote
    });

    Ok(match source {
        SourceKind::Csv => {
            let path = args
                .csv
                .clone()
                .ok_or_else(|| AppError::usage("--source csv requires --csv PATH."))?;
            let label = args.label.clone().unwrap_or_else(|| label_from_path(&path));
            Box::new(CsvFile {
                label,
                path,
                columns: columns_from_args(args),
            })
        }
        SourceKind::Remote => Box::new(RemoteCsv::from_env(
            args.label.clone(),
            args.url.clone(),
            columns_from_args(args),
        )?),
        SourceKind::Synthetic => Box::new(SyntheticWaves {
            label: args.label.clone().unwrap_or_else(|| SYNTHETIC_LABEL.to_string()),
            options: WaveOptions {
                days: args.synthetic_days,
                noise: args.synthetic_noise,
                seed: args.synthetic_seed,
                ..WaveOptions::default()
            },
        }),
    })
}

fn label_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("CSV")
        .to_string()
}

/// Rewrite argv so `epi` defaults to `epi fit`.
///
/// Rules:
/// - `epi`                      -> `epi fit`
/// - `epi --csv x.csv ...`      -> `epi fit --csv x.csv ...`
/// - `epi --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fit" | "sample");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "fit flags".
    if arg1.starts_with('-') {
        argv.insert(1, "fit".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
