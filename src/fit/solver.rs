//! Bounded Levenberg–Marquardt for the two-wave logistic model.
//!
//! The raw parameters live on wildly different scales (amplitudes ~1e6,
//! offsets and growth scales ~1e1..1e3), so the solver works in normalized
//! coordinates:
//!
//! - each parameter is mapped to `u = (p - lower) / (upper - lower) ∈ [0, 1]`
//! - residuals are divided by the largest `|y|` in the window
//!
//! Each iteration solves the damped subproblem
//!
//! ```text
//! minimize ||J δ + r||² + λ Σ d_k δ_k²      (d_k = ||J_k||², Marquardt scaling)
//! ```
//!
//! as an augmented least-squares system via SVD, then clamps `u + δ` to the
//! box. Variables sitting on a bound whose gradient points out of the box are
//! frozen for that iteration (their Jacobian column is zeroed), so the step
//! moves along the face instead of being clamped to nothing.

use nalgebra::{DMatrix, DVector};

use crate::domain::{FitWindow, PARAM_COUNT, ParamBounds, SolverOptions};
use crate::error::AppError;
use crate::math::solve_least_squares;
use crate::models::{fill_jacobian_row, predict_array};

/// Damping above which no step is expected to help.
const LAMBDA_CEILING: f64 = 1e16;
/// Damping floor, keeps the augmented system full rank.
const LAMBDA_FLOOR: f64 = 1e-15;
/// Scaled cost treated as an exact fit.
const ZERO_COST: f64 = 1e-30;

/// Why a run stopped (all of these count as converged).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Relative cost reduction fell below `ftol`.
    Ftol,
    /// Relative step fell below `xtol`.
    Xtol,
    /// Projected gradient fell below `gtol`.
    Gtol,
    /// Residuals vanished.
    ZeroCost,
    /// No damped step reduces the cost any further.
    Stalled,
}

/// Outcome of one converged solver run.
#[derive(Debug, Clone)]
pub struct SolverRun {
    pub params: [f64; PARAM_COUNT],
    /// Sum of squared residuals in original units.
    pub sse: f64,
    /// Residual evaluations used.
    pub evaluations: usize,
    pub termination: Termination,
}

/// Least-squares problem in normalized coordinates.
struct Scaled<'a> {
    t: &'a [f64],
    y: &'a [f64],
    lower: [f64; PARAM_COUNT],
    width: [f64; PARAM_COUNT],
    y_scale: f64,
}

impl Scaled<'_> {
    fn to_params(&self, u: &[f64; PARAM_COUNT]) -> [f64; PARAM_COUNT] {
        std::array::from_fn(|k| self.lower[k] + u[k] * self.width[k])
    }

    fn residuals(&self, u: &[f64; PARAM_COUNT]) -> Option<DVector<f64>> {
        let p = self.to_params(u);
        let r = DVector::from_iterator(
            self.t.len(),
            self.t
                .iter()
                .zip(self.y)
                .map(|(&t, &y)| (predict_array(&p, t) - y) / self.y_scale),
        );
        if r.iter().all(|v| v.is_finite()) {
            Some(r)
        } else {
            None
        }
    }

    fn jacobian(&self, u: &[f64; PARAM_COUNT]) -> DMatrix<f64> {
        let p = self.to_params(u);
        let mut jac = DMatrix::<f64>::zeros(self.t.len(), PARAM_COUNT);
        let mut row = [0.0; PARAM_COUNT];
        for (i, &t) in self.t.iter().enumerate() {
            fill_jacobian_row(&p, t, &mut row);
            for k in 0..PARAM_COUNT {
                jac[(i, k)] = row[k] * self.width[k] / self.y_scale;
            }
        }
        jac
    }
}

/// Minimize the window's sum of squared residuals from `x0` within `bounds`.
///
/// Returns a `FitDidNotConverge` error when the evaluation budget runs out or
/// the starting point already produces non-finite residuals.
pub fn solve(
    window: &FitWindow,
    bounds: &ParamBounds,
    x0: &[f64; PARAM_COUNT],
    opts: &SolverOptions,
) -> Result<SolverRun, AppError> {
    if window.is_empty() {
        return Err(AppError::fit_did_not_converge("No data points to fit."));
    }

    let y_scale = window.y.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let problem = Scaled {
        t: &window.t,
        y: &window.y,
        lower: bounds.lower,
        width: std::array::from_fn(|k| bounds.width(k)),
        y_scale: if y_scale > 0.0 { y_scale } else { 1.0 },
    };

    let x0 = bounds.clamp(x0);
    let mut u: [f64; PARAM_COUNT] = std::array::from_fn(|k| (x0[k] - problem.lower[k]) / problem.width[k]);
    let mut r = problem
        .residuals(&u)
        .ok_or_else(|| AppError::fit_did_not_converge("Residuals are not finite at the starting point."))?;
    let mut evaluations = 1usize;
    let mut cost = 0.5 * r.norm_squared();
    let mut lambda: Option<f64> = None;

    let finish = |u: &[f64; PARAM_COUNT], cost: f64, evaluations: usize, termination: Termination| SolverRun {
        params: problem.to_params(u),
        sse: 2.0 * cost * problem.y_scale * problem.y_scale,
        evaluations,
        termination,
    };

    loop {
        if cost <= ZERO_COST {
            return Ok(finish(&u, cost, evaluations, Termination::ZeroCost));
        }

        let jac = problem.jacobian(&u);
        let grad = jac.transpose() * &r;

        // Freeze variables pinned against a bound by the descent direction.
        let free: [bool; PARAM_COUNT] =
            std::array::from_fn(|k| !((u[k] <= 0.0 && grad[k] > 0.0) || (u[k] >= 1.0 && grad[k] < 0.0)));

        let pg_inf = (0..PARAM_COUNT)
            .filter(|&k| free[k])
            .map(|k| grad[k].abs())
            .fold(0.0, f64::max);
        if pg_inf <= opts.gtol {
            return Ok(finish(&u, cost, evaluations, Termination::Gtol));
        }

        let diag: [f64; PARAM_COUNT] = std::array::from_fn(|k| jac.column(k).norm_squared().max(1e-12));
        let mut lam = lambda.unwrap_or(1e-3);

        let n = jac.nrows();
        let mut rhs = DVector::<f64>::zeros(n + PARAM_COUNT);
        rhs.rows_mut(0, n).copy_from(&(-&r));

        loop {
            if lam > LAMBDA_CEILING {
                return Ok(finish(&u, cost, evaluations, Termination::Stalled));
            }

            let mut aug = DMatrix::<f64>::zeros(n + PARAM_COUNT, PARAM_COUNT);
            for k in 0..PARAM_COUNT {
                if free[k] {
                    aug.view_mut((0, k), (n, 1)).copy_from(&jac.column(k));
                }
                aug[(n + k, k)] = (lam * diag[k]).sqrt();
            }

            let Some(delta) = solve_least_squares(&aug, &rhs) else {
                lam *= 10.0;
                continue;
            };

            let u_new: [f64; PARAM_COUNT] = std::array::from_fn(|k| {
                if free[k] {
                    (u[k] + delta[k]).clamp(0.0, 1.0)
                } else {
                    u[k]
                }
            });
            let step_norm = (0..PARAM_COUNT)
                .map(|k| (u_new[k] - u[k]).powi(2))
                .sum::<f64>()
                .sqrt();
            if step_norm == 0.0 {
                return Ok(finish(&u, cost, evaluations, Termination::Stalled));
            }

            if evaluations >= opts.max_evals {
                return Err(AppError::fit_did_not_converge(format!(
                    "Optimal parameters not found: the maximum number of function evaluations ({}) is exceeded.",
                    opts.max_evals
                )));
            }
            evaluations += 1;

            let Some(r_new) = problem.residuals(&u_new) else {
                lam *= 10.0;
                continue;
            };
            let cost_new = 0.5 * r_new.norm_squared();

            if cost_new < cost {
                let rel_reduction = (cost - cost_new) / cost;
                let u_norm = u.iter().map(|v| v * v).sum::<f64>().sqrt();

                u = u_new;
                r = r_new;
                cost = cost_new;
                lambda = Some((lam / 3.0).max(LAMBDA_FLOOR));

                if rel_reduction <= opts.ftol {
                    return Ok(finish(&u, cost, evaluations, Termination::Ftol));
                }
                if step_norm <= opts.xtol * (opts.xtol + u_norm) {
                    return Ok(finish(&u, cost, evaluations, Termination::Xtol));
                }
                break;
            }

            lam *= 4.0;
        }
    }
}
