//! Small dense least-squares helpers.
//!
//! The solver repeatedly needs the minimizer of `||A δ - b||²` for a damped,
//! augmented Jacobian `A` (a tall `(n + 6) x 6` matrix). We use SVD:
//! - it handles tall and rank-deficient systems without panicking
//!   (nalgebra's `QR::solve` is intended for square systems)
//! - the parameter dimension is tiny, so the cost is irrelevant next to the
//!   residual evaluations

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Progressively looser singular-value cutoffs before giving up.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Moore-Penrose pseudo-inverse of a square symmetric matrix (e.g. `JᵀJ`).
///
/// Singular values below `rel_tol * σ_max` are treated as zero.
pub fn pseudo_inverse(m: &DMatrix<f64>, rel_tol: f64) -> Option<DMatrix<f64>> {
    let svd = m.clone().svd(true, true);
    let sigma_max = svd.singular_values.iter().copied().fold(0.0, f64::max);
    if !(sigma_max.is_finite() && sigma_max > 0.0) {
        return None;
    }
    let inv = svd.pseudo_inverse(rel_tol * sigma_max).ok()?;
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn least_squares_tolerates_rank_deficiency() {
        // Two identical columns: the minimum-norm solution splits the weight.
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        let y = DVector::from_row_slice(&[2.0, 4.0, 6.0]);
        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-9);
        assert!((beta[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pseudo_inverse_of_diagonal() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 0.5]);
        let inv = pseudo_inverse(&m, 1e-12).unwrap();
        assert!((inv[(0, 0)] - 0.25).abs() < 1e-12);
        assert!((inv[(1, 1)] - 2.0).abs() < 1e-12);
        assert!(inv[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn pseudo_inverse_of_zero_is_none() {
        let m = DMatrix::<f64>::zeros(3, 3);
        assert!(pseudo_inverse(&m, 1e-12).is_none());
    }
}
