//! Synthetic two-wave case series.
//!
//! Used for offline demos (`epi sample`, `--source synthetic`) and tests.
//! Values follow the model exactly, then get log-normal multiplicative noise
//! with unit mean, so the noise level is relative to the curve height.

use chrono::{NaiveDate, NaiveDateTime};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::DatasetProvider;
use crate::domain::{MAX_DAY_SPAN, Observation, ObservationSeries, SigmoidParams, date_after_days};
use crate::error::AppError;
use crate::models::predict;

/// Generator settings.
#[derive(Debug, Clone)]
pub struct WaveOptions {
    pub params: SigmoidParams,
    /// Number of rows.
    pub days: usize,
    /// Spacing between rows in days.
    pub step: f64,
    /// Relative noise standard deviation (0 disables noise).
    pub noise: f64,
    pub seed: u64,
    pub start: NaiveDateTime,
}

impl Default for WaveOptions {
    fn default() -> Self {
        Self {
            params: default_wave_params(),
            days: 200,
            step: 1.0,
            noise: 0.02,
            seed: 42,
            start: default_start(),
        }
    }
}

/// Two waves peaking in growth around day 25 and day 70.
pub fn default_wave_params() -> SigmoidParams {
    SigmoidParams {
        a1: 500_000.0,
        b1: 25.0,
        c1: 4.0,
        a2: 1_500_000.0,
        b2: 70.0,
        c2: 8.0,
    }
}

/// First day of the Italian national series.
pub fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 2, 24)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// A seeded synthetic series.
#[derive(Debug, Clone)]
pub struct SyntheticWaves {
    pub label: String,
    pub options: WaveOptions,
}

impl DatasetProvider for SyntheticWaves {
    fn label(&self) -> &str {
        &self.label
    }

    fn load(&self) -> Result<ObservationSeries, AppError> {
        generate_waves(&self.label, &self.options)
    }
}

/// Generate a series from `options`. Same options, same series.
pub fn generate_waves(label: &str, options: &WaveOptions) -> Result<ObservationSeries, AppError> {
    if options.days == 0 {
        return Err(AppError::usage("Synthetic series needs at least one day."));
    }
    if !(options.step.is_finite() && options.step > 0.0) {
        return Err(AppError::usage(format!("Step must be finite and > 0, got {}.", options.step)));
    }
    let span = (options.days - 1) as f64 * options.step;
    if span > MAX_DAY_SPAN {
        return Err(AppError::usage(format!(
            "Synthetic series spans {span} days; at most {MAX_DAY_SPAN} are supported."
        )));
    }
    if !(options.noise.is_finite() && options.noise >= 0.0) {
        return Err(AppError::usage(format!("Noise must be finite and >= 0, got {}.", options.noise)));
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let normal = Normal::new(0.0, options.noise)
        .map_err(|e| AppError::usage(format!("Noise distribution error: {e}")))?;
    // E[exp(X)] = exp(σ²/2) for X ~ N(0, σ²).
    let mean_correction = 0.5 * options.noise * options.noise;

    let observations = (0..options.days)
        .map(|i| {
            let t = i as f64 * options.step;
            let z: f64 = normal.sample(&mut rng);
            let timestamp = date_after_days(options.start, t)
                .ok_or_else(|| AppError::usage(format!("Day {t} after {} is outside the calendar.", options.start)))?;
            Ok(Observation {
                timestamp,
                total_cases: predict(&options.params, t) * (z - mean_correction).exp(),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    ObservationSeries::new(label, observations)
}
