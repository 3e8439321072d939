//! Evaluation of the two-wave logistic model.
//!
//! ```text
//! f(t) = a1 / (exp(-(t-b1)/c1) + 1) + a2 / (exp(-(t-b2)/c2) + 1)
//! ```
//!
//! The fitter relies on two primitive operations:
//! - predict `f(t)` for a parameter vector (residuals, plots, exports)
//! - fill a Jacobian row `∂f/∂p` for a parameter vector (solver steps)

use crate::domain::{PARAM_COUNT, SigmoidParams};
use crate::math::{logistic, logistic_gradient, logistic_inverse};

/// Predict cumulative cases `t` days after the series start.
pub fn predict(params: &SigmoidParams, t: f64) -> f64 {
    predict_array(&params.to_array(), t)
}

/// `predict` over a raw parameter vector in `PARAM_NAMES` order.
pub fn predict_array(p: &[f64; PARAM_COUNT], t: f64) -> f64 {
    logistic(t, p[0], p[1], p[2]) + logistic(t, p[3], p[4], p[5])
}

/// Fill `out` with `∂f/∂p` at `t`.
pub fn fill_jacobian_row(p: &[f64; PARAM_COUNT], t: f64, out: &mut [f64; PARAM_COUNT]) {
    let g1 = logistic_gradient(t, p[0], p[1], p[2]);
    let g2 = logistic_gradient(t, p[3], p[4], p[5]);
    out[..3].copy_from_slice(&g1);
    out[3..].copy_from_slice(&g2);
}

/// Sample the fitted curve at `n` evenly spaced days in `[0, days]`.
pub fn sample_curve(params: &SigmoidParams, days: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let t = days * i as f64 / (n as f64 - 1.0);
            (t, predict(params, t))
        })
        .collect()
}

/// A single logistic term, exposed for diagnostics.
pub fn sigmoid_single(x: f64, a: f64, b: f64, c: f64) -> f64 {
    logistic(x, a, b, c)
}

/// Day at which a single logistic term reaches `y`, if it ever does.
///
/// Not used by the fit/plot flow.
pub fn sigmoid_single_inverse(y: f64, a: f64, b: f64, c: f64) -> Option<f64> {
    logistic_inverse(y, a, b, c)
}
