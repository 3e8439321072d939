//! Logistic building blocks for the growth-curve model.
//!
//! A single term is
//!
//! - `g(t; a, b, c) = a / (exp(-(t - b)/c) + 1) = a * σ((t - b)/c)`
//!
//! Numerical notes:
//! - `exp(-z)` overflows for very negative `z`. `sigma` branches on the sign
//!   of `z` so only `exp` of a non-positive argument is ever taken.
//! - The inverse uses `ln((a - y)/y)` instead of `ln(a/y - 1)` to keep
//!   precision when `y` is close to `a`.

/// Standard logistic `1 / (1 + exp(-z))`, stable for any finite `z`.
pub fn sigma(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// One logistic term `a / (exp(-(t - b)/c) + 1)`.
pub fn logistic(t: f64, a: f64, b: f64, c: f64) -> f64 {
    a * sigma((t - b) / c)
}

/// Partial derivatives of `logistic` with respect to `(a, b, c)`.
pub fn logistic_gradient(t: f64, a: f64, b: f64, c: f64) -> [f64; 3] {
    let z = (t - b) / c;
    let s = sigma(z);
    let ds = s * (1.0 - s);
    [s, -a * ds / c, -a * ds * z / c]
}

/// Solve `y = a / (exp(-(x - b)/c) + 1)` for `x`.
///
/// Returns `None` outside the open range between 0 and `a`, where the term
/// never takes the value `y`.
pub fn logistic_inverse(y: f64, a: f64, b: f64, c: f64) -> Option<f64> {
    if !(y.is_finite() && a.is_finite() && b.is_finite() && c.is_finite()) || c == 0.0 {
        return None;
    }
    let inside = if a > 0.0 { y > 0.0 && y < a } else { y < 0.0 && y > a };
    if !inside {
        return None;
    }
    Some(-c * ((a - y) / y).ln() + b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_is_finite_at_extremes() {
        assert_eq!(sigma(0.0), 0.5);
        assert!((sigma(800.0) - 1.0).abs() < 1e-15);
        assert!(sigma(-800.0) >= 0.0 && sigma(-800.0) < 1e-300);
        assert!(sigma(f64::MAX).is_finite());
        assert!(sigma(-f64::MAX).is_finite());
    }

    #[test]
    fn logistic_saturates_at_amplitude() {
        let a = 1.5e6;
        assert!((logistic(50.0, a, 50.0, 4.0) - a / 2.0).abs() < 1e-6);
        assert!((logistic(1e5, a, 50.0, 4.0) - a).abs() < 1e-6);
        assert!(logistic(-1e5, a, 50.0, 4.0).abs() < 1e-6);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let (t, a, b, c) = (37.0, 8.0e5, 42.0, 6.5);
        let g = logistic_gradient(t, a, b, c);
        let h = [a * 1e-7, 1e-6, 1e-6];
        let base = [a, b, c];
        for k in 0..3 {
            let mut up = base;
            let mut dn = base;
            up[k] += h[k];
            dn[k] -= h[k];
            let fd = (logistic(t, up[0], up[1], up[2]) - logistic(t, dn[0], dn[1], dn[2])) / (2.0 * h[k]);
            let scale = g[k].abs().max(1.0);
            assert!((fd - g[k]).abs() / scale < 1e-5, "d/d{k}: fd={fd}, analytic={}", g[k]);
        }
    }

    #[test]
    fn inverse_undoes_single_term() {
        let cases: [(f64, f64, f64); 4] = [
            (1.0e6, 50.0, 8.0),
            (250_000.0, 3.0, 1.0),
            (4.0e6, 400.0, 120.0),
            (2.0, -5.0, -3.0),
        ];
        for (a, b, c) in cases {
            for &x0 in &[b - 2.0 * c.abs(), b - 0.3, b, b + 0.7 * c.abs(), b + 3.0 * c.abs()] {
                let y = logistic(x0, a, b, c);
                let x = logistic_inverse(y, a, b, c).unwrap();
                assert!(
                    (x - x0).abs() < 1e-8 * x0.abs().max(1.0),
                    "a={a} b={b} c={c}: x0={x0}, got {x}"
                );
            }
        }
    }

    #[test]
    fn inverse_outside_range_is_none() {
        assert_eq!(logistic_inverse(0.0, 10.0, 1.0, 1.0), None);
        assert_eq!(logistic_inverse(10.0, 10.0, 1.0, 1.0), None);
        assert_eq!(logistic_inverse(12.0, 10.0, 1.0, 1.0), None);
        assert_eq!(logistic_inverse(5.0, 10.0, 1.0, 0.0), None);
    }
}
