//! Command-line parsing for the epidemic curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{SourceKind, default_output_path};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "epi", version, about = "Two-wave logistic fit of cumulative epidemic cases")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a case series, fit the two-wave model and plot observed vs fitted.
    Fit(FitArgs),
    /// Write a synthetic two-wave series as CSV.
    Sample(SampleArgs),
}

/// Options for `epi fit`.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Data source. Defaults to `csv` when --csv is given, `remote` otherwise.
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// Local CSV file.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Dataset URL for the remote source (overrides EPI_DATASET_URL).
    #[arg(long)]
    pub url: Option<String>,

    /// Series label used in logs and the plot legend.
    #[arg(long)]
    pub label: Option<String>,

    /// Name of the date column.
    #[arg(long, default_value = "data")]
    pub date_column: String,

    /// Name of the cumulative cases column.
    #[arg(long, default_value = "totale_casi")]
    pub cases_column: String,

    /// Number of leading rows used for the fit (also the plotted curve length, in days).
    #[arg(long, default_value_t = 300)]
    pub fitted_days: usize,

    /// Upper bound of the y axis.
    #[arg(long, default_value_t = 2.5e6)]
    pub ymax: f64,

    /// Image path (.png, .jpg, .bmp or .svg).
    #[arg(long, default_value_os_t = default_output_path())]
    pub output: PathBuf,

    /// Image width in pixels.
    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    /// Image height in pixels.
    #[arg(long, default_value_t = 768)]
    pub height: u32,

    /// Open the terminal viewer after writing the image.
    #[arg(long)]
    pub show: bool,

    /// Export the fit (parameters + fitted grid) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,

    /// Residual evaluation budget per solver start.
    #[arg(long, default_value_t = 1000)]
    pub max_evals: usize,

    /// Relative cost reduction tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub ftol: f64,

    /// Relative step tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub xtol: f64,

    /// Projected gradient tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub gtol: f64,

    /// Seed grid points per offset dimension.
    #[arg(long, default_value_t = 20)]
    pub seed_offset_steps: usize,

    /// Seed grid points per scale dimension.
    #[arg(long, default_value_t = 10)]
    pub seed_scale_steps: usize,

    /// Best seed tuples refined by the solver (in addition to the bounds midpoint).
    #[arg(long, default_value_t = 4)]
    pub refine_top: usize,

    /// Fits with R^2 at or below this value are rejected.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub min_r_squared: f64,

    /// Lower amplitude bound (cases).
    #[arg(long, default_value_t = 100_000.0)]
    pub amplitude_min: f64,

    /// Upper amplitude bound (cases).
    #[arg(long, default_value_t = 4_000_000.0)]
    pub amplitude_max: f64,

    /// Lower midpoint bound (days).
    #[arg(long, default_value_t = 1.0)]
    pub offset_min: f64,

    /// Upper midpoint bound (days).
    #[arg(long, default_value_t = 1000.0)]
    pub offset_max: f64,

    /// Lower growth scale bound (days).
    #[arg(long, default_value_t = 1.0)]
    pub scale_min: f64,

    /// Upper growth scale bound (days).
    #[arg(long, default_value_t = 1000.0)]
    pub scale_max: f64,

    /// Rows of the synthetic source.
    #[arg(long, default_value_t = 200)]
    pub synthetic_days: usize,

    /// Relative noise of the synthetic source.
    #[arg(long, default_value_t = 0.02)]
    pub synthetic_noise: f64,

    /// Random seed of the synthetic source.
    #[arg(long, default_value_t = 42)]
    pub synthetic_seed: u64,
}

/// Options for `epi sample`.
#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// CSV file to write.
    #[arg(long, value_name = "PATH")]
    pub output: PathBuf,

    /// Number of rows.
    #[arg(long, default_value_t = 200)]
    pub days: usize,

    /// Spacing between rows in days.
    #[arg(long, default_value_t = 1.0)]
    pub step: f64,

    /// Relative noise standard deviation.
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Date of the first row (YYYY-MM-DD).
    #[arg(long, default_value = "2020-02-24")]
    pub start: String,

    /// Name of the date column.
    #[arg(long, default_value = "data")]
    pub date_column: String,

    /// Name of the cumulative cases column.
    #[arg(long, default_value = "totale_casi")]
    pub cases_column: String,
}
