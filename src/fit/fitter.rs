//! Fit orchestration for the two-wave logistic model.
//!
//! Given a fit window `(t_i, y_i)` and box constraints we:
//!
//! 1. score every `(b1, c1, b2, c2)` tuple of the seed grid (parallel). For a
//!    fixed tuple the model is linear in `(a1, a2)`, so the amplitudes are the
//!    exact box-constrained least-squares solution and the score is its SSE
//! 2. run the bounded solver from the bounds midpoint and from the best
//!    `refine_top` grid tuples
//! 3. keep the lowest-SSE converged run and apply the quality guard
//!
//! `try_fit` is the entry point used by the pipeline: it turns a
//! `FitDidNotConverge` error into the `None` sentinel after logging it.

use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{
    FitConfig, FitQuality, FitStart, FitWindow, PARAM_COUNT, ParamBounds, SigmoidFit, SigmoidParams,
};
use crate::error::{AppError, ErrorKind};
use crate::fit::grid::{Shape, component_shapes, pair_indices};
use crate::fit::solver::{SolverRun, solve};
use crate::math::{pseudo_inverse, sigma};
use crate::models::{fill_jacobian_row, predict};

/// A scored seed grid tuple.
#[derive(Debug, Clone)]
pub struct Seed {
    idx: usize,
    pub params: [f64; PARAM_COUNT],
    pub sse: f64,
}

/// Fit the window, converting non-convergence into `Ok(None)`.
///
/// Other error kinds (e.g. an invalid configuration) are returned unchanged.
pub fn try_fit(window: &FitWindow, config: &FitConfig) -> Result<Option<SigmoidFit>, AppError> {
    match fit_window(window, config) {
        Ok(fit) => Ok(Some(fit)),
        Err(err) if err.kind() == ErrorKind::FitDidNotConverge => {
            warn!(points = window.len(), "{err}");
            warn!("Fit was not successful. Try other parameters.");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Fit the two-wave model to the window by bounded nonlinear least squares.
pub fn fit_window(window: &FitWindow, config: &FitConfig) -> Result<SigmoidFit, AppError> {
    config.validate()?;
    if window.is_empty() {
        return Err(AppError::fit_did_not_converge("No data points to fit."));
    }
    if window.t.iter().chain(&window.y).any(|v| !v.is_finite()) {
        return Err(AppError::fit_did_not_converge("Fit window contains non-finite values."));
    }

    let bounds = &config.bounds;
    let seeds = score_seed_grid(window, config)?;

    let mut starts = vec![(FitStart::Midpoint, bounds.midpoint())];
    starts.extend(
        seeds
            .iter()
            .take(config.seeds.refine_top)
            .enumerate()
            .map(|(rank, s)| (FitStart::Grid(rank), s.params)),
    );

    let mut best: Option<(FitStart, SolverRun)> = None;
    let mut last_err: Option<AppError> = None;
    for (start, x0) in starts {
        match solve(window, bounds, &x0, &config.solver) {
            Ok(run) => {
                debug!(
                    ?start,
                    sse = run.sse,
                    evaluations = run.evaluations,
                    termination = ?run.termination,
                    "solver run converged"
                );
                // Strict `<` keeps the earliest start on ties.
                if best.as_ref().is_none_or(|(_, b)| run.sse < b.sse) {
                    best = Some((start, run));
                }
            }
            Err(err) => {
                debug!(?start, "solver run failed: {err}");
                last_err = Some(err);
            }
        }
    }

    let Some((start, run)) = best else {
        return Err(last_err.unwrap_or_else(|| AppError::fit_did_not_converge("No solver start converged.")));
    };

    let params = SigmoidParams::from_array(run.params).canonical();
    let quality = compute_quality(window, &params);
    if !quality.sse.is_finite() {
        return Err(AppError::fit_did_not_converge("Fitted curve produced non-finite residuals."));
    }
    if !(quality.r_squared > config.min_r_squared) {
        return Err(AppError::fit_did_not_converge(format!(
            "Fit rejected: R^2 = {:.4} does not exceed {:.4}; the bounded model cannot represent this data.",
            quality.r_squared, config.min_r_squared
        )));
    }

    let covariance = estimate_covariance(window, &params, quality.sse);

    Ok(SigmoidFit {
        params,
        quality,
        covariance,
        evaluations: run.evaluations,
        start,
    })
}

/// Score the seed grid and return tuples sorted best-first.
///
/// Ordering is deterministic: ascending SSE, ties broken by grid index.
pub fn score_seed_grid(window: &FitWindow, config: &FitConfig) -> Result<Vec<Seed>, AppError> {
    let shapes = component_shapes(window, &config.bounds, &config.seeds)?;

    // Each shape's logistic column is shared by many pairs; compute it once.
    let columns: Vec<ShapeColumn> = shapes
        .par_iter()
        .map(|&shape| ShapeColumn::new(shape, window))
        .collect();
    let index_pairs = pair_indices(columns.len());

    let mut seeds: Vec<Seed> = index_pairs
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &(i, j))| evaluate_seed(idx, &columns[i], &columns[j], window, &config.bounds))
        .collect();

    if seeds.is_empty() {
        return Err(AppError::fit_did_not_converge("No valid seed candidates."));
    }

    seeds.sort_by(|a, b| a.sse.total_cmp(&b.sse).then(a.idx.cmp(&b.idx)));
    Ok(seeds)
}

/// Logistic values `σ((t_i - b)/c)` for one component shape.
struct ShapeColumn {
    shape: Shape,
    values: Vec<f64>,
    ss: f64,
    sy: f64,
}

impl ShapeColumn {
    fn new(shape: Shape, window: &FitWindow) -> Self {
        let (b, c) = shape;
        let values: Vec<f64> = window.t.iter().map(|&t| sigma((t - b) / c)).collect();
        let ss = values.iter().map(|v| v * v).sum();
        let sy = values.iter().zip(&window.y).map(|(v, y)| v * y).sum();
        Self { shape, values, ss, sy }
    }
}

fn evaluate_seed(
    idx: usize,
    first: &ShapeColumn,
    second: &ShapeColumn,
    window: &FitWindow,
    bounds: &ParamBounds,
) -> Option<Seed> {
    let s12: f64 = first.values.iter().zip(&second.values).map(|(a, b)| a * b).sum();
    let (a1, a2) = bounded_amplitudes(
        [first.ss, s12, second.ss],
        [first.sy, second.sy],
        (bounds.lower[0], bounds.upper[0]),
        (bounds.lower[3], bounds.upper[3]),
    );

    let mut sse = 0.0;
    for i in 0..window.len() {
        let r = window.y[i] - a1 * first.values[i] - a2 * second.values[i];
        sse += r * r;
    }
    if !sse.is_finite() {
        return None;
    }

    let (b1, c1) = first.shape;
    let (b2, c2) = second.shape;
    Some(Seed {
        idx,
        params: [a1, b1, c1, a2, b2, c2],
        sse,
    })
}

/// Minimize `||y - a1 s1 - a2 s2||²` over the box `a1 ∈ r1`, `a2 ∈ r2`.
///
/// `gram = [s1·s1, s1·s2, s2·s2]`, `rhs = [s1·y, s2·y]`. The objective is a
/// convex quadratic, so the minimizer is either the unconstrained solution
/// (when it is feasible) or lies on an edge, where the 1-D minimizer is a clamp.
fn bounded_amplitudes(gram: [f64; 3], rhs: [f64; 2], r1: (f64, f64), r2: (f64, f64)) -> (f64, f64) {
    let [s11, s12, s22] = gram;
    let [s1y, s2y] = rhs;
    let objective = |a1: f64, a2: f64| a1 * a1 * s11 + 2.0 * a1 * a2 * s12 + a2 * a2 * s22 - 2.0 * (a1 * s1y + a2 * s2y);

    let det = s11 * s22 - s12 * s12;
    if det > 1e-12 * s11 * s22 {
        let a1 = (s1y * s22 - s2y * s12) / det;
        let a2 = (s2y * s11 - s1y * s12) / det;
        if (r1.0..=r1.1).contains(&a1) && (r2.0..=r2.1).contains(&a2) {
            return (a1, a2);
        }
    }

    let along = |fixed: f64, cross: f64, s_own: f64, s_own_y: f64, range: (f64, f64)| {
        if s_own > 0.0 {
            ((s_own_y - fixed * cross) / s_own).clamp(range.0, range.1)
        } else {
            range.0
        }
    };

    let candidates = [
        (r1.0, along(r1.0, s12, s22, s2y, r2)),
        (r1.1, along(r1.1, s12, s22, s2y, r2)),
        (along(r2.0, s12, s11, s1y, r1), r2.0),
        (along(r2.1, s12, s11, s1y, r1), r2.1),
    ];
    candidates
        .into_iter()
        .min_by(|a, b| objective(a.0, a.1).total_cmp(&objective(b.0, b.1)))
        .unwrap_or((r1.0, r2.0))
}

/// SSE, RMSE and R^2 of `params` over the window.
pub fn compute_quality(window: &FitWindow, params: &SigmoidParams) -> FitQuality {
    let n = window.len();
    let mean = window.y.iter().sum::<f64>() / n.max(1) as f64;
    let mut sse = 0.0;
    let mut sst = 0.0;
    for (&t, &y) in window.t.iter().zip(&window.y) {
        let r = y - predict(params, t);
        sse += r * r;
        sst += (y - mean) * (y - mean);
    }
    let rmse = (sse / n.max(1) as f64).sqrt();
    // A constant window carries no variance to explain.
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 0.0 };
    FitQuality {
        n,
        sse,
        rmse,
        r_squared,
    }
}

/// Parameter covariance `s² (JᵀJ)⁺` with `s² = SSE / (n - 6)`.
///
/// Returns `None` when the window has no residual degrees of freedom.
pub fn estimate_covariance(window: &FitWindow, params: &SigmoidParams, sse: f64) -> Option<Vec<Vec<f64>>> {
    let n = window.len();
    if n <= PARAM_COUNT {
        return None;
    }
    let p = params.to_array();
    let mut jac = DMatrix::<f64>::zeros(n, PARAM_COUNT);
    let mut row = [0.0; PARAM_COUNT];
    for (i, &t) in window.t.iter().enumerate() {
        fill_jacobian_row(&p, t, &mut row);
        for k in 0..PARAM_COUNT {
            jac[(i, k)] = row[k];
        }
    }
    let jtj = jac.transpose() * &jac;
    let inv = pseudo_inverse(&jtj, 1e-15)?;
    let s2 = sse / (n - PARAM_COUNT) as f64;
    Some(
        (0..PARAM_COUNT)
            .map(|i| (0..PARAM_COUNT).map(|j| inv[(i, j)] * s2).collect())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SeedOptions;
    use crate::models::predict_array;

    const TRUTH: [f64; PARAM_COUNT] = [500_000.0, 25.0, 4.0, 1_500_000.0, 70.0, 8.0];

    fn synthetic(params: [f64; PARAM_COUNT], days: usize) -> FitWindow {
        let t: Vec<f64> = (0..days).map(|d| d as f64).collect();
        let y = t.iter().map(|&t| predict_array(&params, t)).collect();
        FitWindow { t, y }
    }

    #[test]
    fn recovers_known_parameters() {
        let window = synthetic(TRUTH, 100);
        let fit = fit_window(&window, &FitConfig::default()).unwrap();
        let got = fit.params.to_array();
        for k in 0..PARAM_COUNT {
            assert!(
                (got[k] - TRUTH[k]).abs() <= 1e-2 * TRUTH[k],
                "param {k}: got {}, want {}",
                got[k],
                TRUTH[k]
            );
        }
        assert!(fit.quality.r_squared > 0.999_999);
        assert_eq!(fit.quality.n, 100);
        assert!(fit.covariance.is_some());
    }

    #[test]
    fn recovered_components_are_ordered_by_offset() {
        // Same curve with components listed in reverse order.
        let swapped = [TRUTH[3], TRUTH[4], TRUTH[5], TRUTH[0], TRUTH[1], TRUTH[2]];
        let fit = fit_window(&synthetic(swapped, 100), &FitConfig::default()).unwrap();
        assert!(fit.params.b1 <= fit.params.b2);
        assert!((fit.params.b1 - 25.0).abs() < 0.1);
    }

    #[test]
    fn decreasing_data_is_no_fit() {
        let t: Vec<f64> = (0..60).map(|d| d as f64).collect();
        let y = t.iter().map(|&t| 2_000_000.0 - 15_000.0 * t).collect();
        let window = FitWindow { t, y };

        let err = fit_window(&window, &FitConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FitDidNotConverge);

        let outcome = try_fit(&window, &FitConfig::default()).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn constant_data_is_no_fit() {
        let window = FitWindow {
            t: (0..30).map(|d| d as f64).collect(),
            y: vec![500_000.0; 30],
        };
        assert!(try_fit(&window, &FitConfig::default()).unwrap().is_none());
    }

    #[test]
    fn five_points_fit_without_covariance() {
        let window = FitWindow {
            t: vec![0.0, 10.0, 20.0, 30.0, 40.0],
            y: vec![100_000.0, 150_000.0, 400_000.0, 900_000.0, 1_500_000.0],
        };
        let fit = try_fit(&window, &FitConfig::default()).unwrap().expect("five rising points fit");
        assert_eq!(fit.quality.n, 5);
        assert!(fit.quality.r_squared > 0.0);
        assert!(fit.covariance.is_none());
        assert!(ParamBounds::default().contains(&fit.params.to_array()));
    }

    #[test]
    fn empty_window_is_no_fit() {
        let window = FitWindow { t: vec![], y: vec![] };
        assert!(try_fit(&window, &FitConfig::default()).unwrap().is_none());
    }

    #[test]
    fn invalid_config_is_not_swallowed() {
        let config = FitConfig {
            fitted_days: 0,
            ..FitConfig::default()
        };
        let err = try_fit(&synthetic(TRUTH, 20), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn seed_grid_is_sorted_and_in_bounds() {
        let window = synthetic(TRUTH, 100);
        let config = FitConfig {
            seeds: SeedOptions {
                offset_steps: 6,
                scale_steps: 4,
                refine_top: 2,
            },
            ..FitConfig::default()
        };
        let seeds = score_seed_grid(&window, &config).unwrap();
        assert_eq!(seeds.len(), 24 * 25 / 2);
        assert!(seeds.windows(2).all(|w| w[0].sse <= w[1].sse));
        assert!(seeds.iter().all(|s| config.bounds.contains(&s.params)));
    }

    #[test]
    fn bounded_amplitudes_interior_and_edge() {
        // s1 = [1, 0], s2 = [0, 1], y = [3, 5]: unconstrained (3, 5).
        let interior = bounded_amplitudes([1.0, 0.0, 1.0], [3.0, 5.0], (0.0, 10.0), (0.0, 10.0));
        assert_eq!(interior, (3.0, 5.0));
        // Cap a2 at 4.
        let edge = bounded_amplitudes([1.0, 0.0, 1.0], [3.0, 5.0], (0.0, 10.0), (0.0, 4.0));
        assert_eq!(edge, (3.0, 4.0));
    }

    #[test]
    fn quality_of_exact_curve() {
        let window = synthetic(TRUTH, 50);
        let q = compute_quality(&window, &SigmoidParams::from_array(TRUTH));
        assert!(q.sse < 1e-12);
        assert!((q.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(q.n, 50);
    }
}
