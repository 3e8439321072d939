//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON
//! - reloaded later for inspection

use std::path::PathBuf;

use chrono::{Duration, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Longest day span accepted for fit windows and generated series.
///
/// Keeps every plotted or generated date well inside the calendar range.
pub const MAX_DAY_SPAN: f64 = 1_000_000.0;

/// Number of model parameters (two logistic terms, three parameters each).
pub const PARAM_COUNT: usize = 6;

/// Parameter names in vector order.
pub const PARAM_NAMES: [&str; PARAM_COUNT] = ["a1", "b1", "c1", "a2", "b2", "c2"];

/// Where the observation series comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The national Italian series, downloaded over HTTPS.
    Remote,
    /// A local CSV file.
    Csv,
    /// A generated two-wave series with seeded noise.
    Synthetic,
}

/// One row of the cumulative case series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub total_cases: f64,
}

/// A labeled, date-sorted, non-empty observation series.
#[derive(Debug, Clone)]
pub struct ObservationSeries {
    label: String,
    observations: Vec<Observation>,
}

impl ObservationSeries {
    /// Build a series, sorting observations by timestamp.
    ///
    /// The sort is stable, so rows sharing a timestamp keep their source order.
    pub fn new(label: impl Into<String>, mut observations: Vec<Observation>) -> Result<Self, AppError> {
        let label = label.into();
        if observations.is_empty() {
            return Err(AppError::data_unavailable(format!(
                "Series '{label}' has no observations."
            )));
        }
        observations.sort_by_key(|o| o.timestamp);
        Ok(Self { label, observations })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn start(&self) -> NaiveDateTime {
        self.observations[0].timestamp
    }

    pub fn end(&self) -> NaiveDateTime {
        self.observations[self.observations.len() - 1].timestamp
    }

    /// Fractional days elapsed since the first observation, per row.
    pub fn elapsed_days(&self) -> Vec<f64> {
        let start = self.start();
        self.observations
            .iter()
            .map(|o| days_between(start, o.timestamp))
            .collect()
    }

    /// The leading `fitted_days` rows as `(t, y)` pairs.
    ///
    /// A window longer than the series yields the whole series.
    pub fn fit_window(&self, fitted_days: usize) -> FitWindow {
        let n = fitted_days.min(self.observations.len());
        let start = self.start();
        let (t, y) = self.observations[..n]
            .iter()
            .map(|o| (days_between(start, o.timestamp), o.total_cases))
            .unzip();
        FitWindow { t, y }
    }
}

/// Fractional days from `start` to `ts`.
pub fn days_between(start: NaiveDateTime, ts: NaiveDateTime) -> f64 {
    (ts - start).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

/// Calendar timestamp `days` after `start` (millisecond resolution).
///
/// `None` when the result falls outside the representable calendar.
pub fn date_after_days(start: NaiveDateTime, days: f64) -> Option<NaiveDateTime> {
    let millis = (days * SECONDS_PER_DAY * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    let delta = Duration::try_milliseconds(millis as i64)?;
    start.checked_add_signed(delta)
}

/// The `(t, y)` pairs used for parameter estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct FitWindow {
    /// Days since series start.
    pub t: Vec<f64>,
    /// Cumulative cases.
    pub y: Vec<f64>,
}

impl FitWindow {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Largest elapsed day in the window (0 for an empty window).
    pub fn span(&self) -> f64 {
        self.t.iter().copied().fold(0.0, f64::max)
    }
}

/// Parameters of the two-term logistic sum.
///
/// `a*` are amplitudes (cases), `b*` midpoints (days since series start),
/// `c*` growth-rate scales (days).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidParams {
    pub a1: f64,
    pub b1: f64,
    pub c1: f64,
    pub a2: f64,
    pub b2: f64,
    pub c2: f64,
}

impl SigmoidParams {
    pub fn from_array(p: [f64; PARAM_COUNT]) -> Self {
        Self {
            a1: p[0],
            b1: p[1],
            c1: p[2],
            a2: p[3],
            b2: p[4],
            c2: p[5],
        }
    }

    pub fn to_array(self) -> [f64; PARAM_COUNT] {
        [self.a1, self.b1, self.c1, self.a2, self.b2, self.c2]
    }

    /// Same curve with the components ordered so that `b1 <= b2`.
    ///
    /// The model is symmetric under swapping its two terms; ordering by
    /// midpoint gives every curve one representation.
    pub fn canonical(self) -> Self {
        if self.b2 < self.b1 || (self.b2 == self.b1 && self.c2 < self.c1) {
            Self {
                a1: self.a2,
                b1: self.b2,
                c1: self.c2,
                a2: self.a1,
                b2: self.b1,
                c2: self.c1,
            }
        } else {
            self
        }
    }
}

/// Box constraints on the parameter vector (in `PARAM_NAMES` order).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub lower: [f64; PARAM_COUNT],
    pub upper: [f64; PARAM_COUNT],
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            lower: [100_000.0, 1.0, 1.0, 100_000.0, 1.0, 1.0],
            upper: [4_000_000.0, 1000.0, 1000.0, 4_000_000.0, 1000.0, 1000.0],
        }
    }
}

impl ParamBounds {
    /// Bounds shared by both components: `(min, max)` for amplitude, offset, scale.
    pub fn new(amplitude: (f64, f64), offset: (f64, f64), scale: (f64, f64)) -> Result<Self, AppError> {
        let lower = [amplitude.0, offset.0, scale.0, amplitude.0, offset.0, scale.0];
        let upper = [amplitude.1, offset.1, scale.1, amplitude.1, offset.1, scale.1];
        let bounds = Self { lower, upper };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for i in 0..PARAM_COUNT {
            let (lo, hi) = (self.lower[i], self.upper[i]);
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(AppError::usage(format!(
                    "Invalid bounds for {}: [{lo}, {hi}] (must be finite with min < max).",
                    PARAM_NAMES[i]
                )));
            }
        }
        for i in [2, 5] {
            if self.lower[i] <= 0.0 {
                return Err(AppError::usage(format!(
                    "Scale bound {} must be > 0, got {}.",
                    PARAM_NAMES[i], self.lower[i]
                )));
            }
        }
        Ok(())
    }

    /// Midpoint of every bound: the start used when no guess is supplied.
    pub fn midpoint(&self) -> [f64; PARAM_COUNT] {
        std::array::from_fn(|i| 0.5 * (self.lower[i] + self.upper[i]))
    }

    pub fn width(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    pub fn contains(&self, p: &[f64; PARAM_COUNT]) -> bool {
        (0..PARAM_COUNT).all(|i| p[i] >= self.lower[i] && p[i] <= self.upper[i])
    }

    pub fn clamp(&self, p: &[f64; PARAM_COUNT]) -> [f64; PARAM_COUNT] {
        std::array::from_fn(|i| p[i].clamp(self.lower[i], self.upper[i]))
    }
}

/// CSV column names for the two fields the loader needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub date: String,
    pub cases: String,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            date: "data".to_string(),
            cases: "totale_casi".to_string(),
        }
    }
}

/// Termination settings for the Levenberg-Marquardt solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Residual evaluations allowed per start; exhausting them is non-convergence.
    pub max_evals: usize,
    /// Relative cost reduction below which an accepted step ends the run.
    pub ftol: f64,
    /// Relative step size below which an accepted step ends the run.
    pub xtol: f64,
    /// Projected-gradient infinity norm below which the run ends.
    pub gtol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_evals: 1000,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
        }
    }
}

/// Seed grid used to pick solver starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOptions {
    /// Linearly spaced midpoint offsets per component.
    pub offset_steps: usize,
    /// Log-spaced growth scales per component.
    pub scale_steps: usize,
    /// Best grid tuples refined by the solver (in addition to the midpoint start).
    pub refine_top: usize,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            offset_steps: 20,
            scale_steps: 10,
            refine_top: 4,
        }
    }
}

/// Everything the fit routine needs besides the data.
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Leading rows used for estimation.
    pub fitted_days: usize,
    pub bounds: ParamBounds,
    pub solver: SolverOptions,
    pub seeds: SeedOptions,
    /// Fits whose R^2 does not exceed this are rejected.
    pub min_r_squared: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            fitted_days: 100,
            bounds: ParamBounds::default(),
            solver: SolverOptions::default(),
            seeds: SeedOptions::default(),
            min_r_squared: 0.0,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.fitted_days == 0 {
            return Err(AppError::usage("fitted_days must be >= 1."));
        }
        if self.fitted_days as f64 > MAX_DAY_SPAN {
            return Err(AppError::usage(format!(
                "fitted_days must be <= {MAX_DAY_SPAN}, got {}.",
                self.fitted_days
            )));
        }
        self.bounds.validate()?;
        let s = &self.solver;
        if s.max_evals == 0 {
            return Err(AppError::usage("max_evals must be >= 1."));
        }
        for (name, v) in [("ftol", s.ftol), ("xtol", s.xtol), ("gtol", s.gtol)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(AppError::usage(format!("{name} must be finite and >= 0, got {v}.")));
            }
        }
        if self.seeds.offset_steps < 2 || self.seeds.scale_steps < 2 {
            return Err(AppError::usage("Seed grid steps must be >= 2."));
        }
        if !self.min_r_squared.is_finite() {
            return Err(AppError::usage("min_r_squared must be finite."));
        }
        Ok(())
    }
}

/// Output settings for the overlay chart.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    /// Image path; the extension picks the encoder (`.svg`, `.png`, `.jpg`, `.bmp`).
    pub output: PathBuf,
    /// Upper y-axis bound (total cases).
    pub ymax: f64,
    pub width: u32,
    pub height: u32,
    /// Points on the fitted curve between day 0 and `fitted_days`.
    pub curve_samples: usize,
    /// Open the terminal viewer after saving.
    pub show: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            output: default_output_path(),
            ymax: 2.5e6,
            width: 1024,
            height: 768,
            curve_samples: 200,
            show: false,
        }
    }
}

impl PlotConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.ymax.is_finite() && self.ymax > 0.0) {
            return Err(AppError::usage(format!("ymax must be finite and > 0, got {}.", self.ymax)));
        }
        if self.width < 64 || self.height < 64 {
            return Err(AppError::usage("Image width and height must be >= 64 pixels."));
        }
        if self.curve_samples < 2 {
            return Err(AppError::usage("curve_samples must be >= 2."));
        }
        Ok(())
    }
}

/// `<system temp dir>/corona-fit.png`.
pub fn default_output_path() -> PathBuf {
    std::env::temp_dir().join("corona-fit.png")
}

/// Fit quality diagnostics over the fit window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub n: usize,
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
}

/// Which solver start produced the accepted fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitStart {
    /// Midpoint of the bounds.
    Midpoint,
    /// The n-th best seed grid tuple (0 = best).
    Grid(usize),
}

/// A successful fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigmoidFit {
    pub params: SigmoidParams,
    pub quality: FitQuality,
    /// `s^2 (J^T J)^+`, present when the window has more rows than parameters.
    pub covariance: Option<Vec<Vec<f64>>>,
    /// Residual evaluations used by the accepted start.
    pub evaluations: usize,
    pub start: FitStart,
}

impl SigmoidFit {
    /// Square roots of the covariance diagonal.
    pub fn std_errors(&self) -> Option<[f64; PARAM_COUNT]> {
        let cov = self.covariance.as_ref()?;
        if cov.len() != PARAM_COUNT {
            return None;
        }
        Some(std::array::from_fn(|i| cov[i][i].max(0.0).sqrt()))
    }
}

/// A saved fit (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub label: String,
    pub series_start: NaiveDateTime,
    pub fitted_days: usize,
    pub bounds: ParamBounds,
    pub fit: SigmoidFit,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub days: Vec<f64>,
    pub total_cases: Vec<f64>,
}
