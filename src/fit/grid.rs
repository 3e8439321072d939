//! Seed grid generation.
//!
//! The solver is local, so we pick its starting points with a deterministic
//! grid search over the nonlinear parameters `(b1, c1, b2, c2)`:
//! - offsets are linearly spaced across the days actually covered by the data
//!   (plus headroom for a wave still rising at the end of the window)
//! - scales are log-spaced across their bounds

use crate::domain::{FitWindow, ParamBounds, SeedOptions};
use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::usage(format!(
            "Invalid log range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::usage("Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    Ok((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(AppError::usage(format!(
            "Invalid linear range: min={min}, max={max} (must be finite and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::usage("Grid steps must be >= 2."));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| min + step * i as f64).collect())
}

/// One logistic component's nonlinear parameters `(offset, scale)`.
pub type Shape = (f64, f64);

/// All `(offset, scale)` shapes for a single component.
pub fn component_shapes(
    window: &FitWindow,
    bounds: &ParamBounds,
    seeds: &SeedOptions,
) -> Result<Vec<Shape>, AppError> {
    let (b_lo, b_hi) = (bounds.lower[1].max(bounds.lower[4]), bounds.upper[1].min(bounds.upper[4]));
    let (c_lo, c_hi) = (bounds.lower[2].max(bounds.lower[5]), bounds.upper[2].min(bounds.upper[5]));
    if !(b_hi > b_lo && c_hi > c_lo) {
        return Err(AppError::usage("Component bounds do not overlap; cannot build seed grid."));
    }

    // Midpoints far beyond the window are indistinguishable from each other.
    let b_top = (2.0 * window.span() + 1.0)
        .min(b_hi)
        .max(b_lo + (b_hi - b_lo) * 1e-6);
    let offsets = lin_space(b_lo, b_top, seeds.offset_steps)?;
    let scales = log_space(c_lo, c_hi, seeds.scale_steps)?;

    let mut out = Vec::with_capacity(offsets.len() * scales.len());
    for &b in &offsets {
        for &c in &scales {
            out.push((b, c));
        }
    }
    Ok(out)
}

/// Unordered index pairs `(i, j)` with `i <= j < count`, in grid order.
///
/// The model is symmetric in its two components, so `(j, i)` adds nothing.
pub fn pair_indices(count: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(count * (count + 1) / 2);
    for i in 0..count {
        for j in i..count {
            out.push((i, j));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(span: f64) -> FitWindow {
        FitWindow {
            t: vec![0.0, span / 2.0, span],
            y: vec![1.0, 2.0, 3.0],
        }
    }

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(1.0, 1000.0, 4).unwrap();
        assert!((v[0] - 1.0).abs() < 1e-12);
        assert!((v[1] - 10.0).abs() < 1e-9);
        assert!((v[3] - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn lin_space_includes_endpoints() {
        let v = lin_space(1.0, 3.0, 5).unwrap();
        assert_eq!(v, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
        assert!(lin_space(3.0, 3.0, 5).is_err());
        assert!(lin_space(1.0, 3.0, 1).is_err());
    }

    #[test]
    fn offsets_track_the_window_span() {
        let bounds = ParamBounds::default();
        let seeds = SeedOptions::default();
        let shapes = component_shapes(&window(100.0), &bounds, &seeds).unwrap();
        assert_eq!(shapes.len(), seeds.offset_steps * seeds.scale_steps);
        let b_max = shapes.iter().map(|s| s.0).fold(f64::MIN, f64::max);
        assert!((b_max - 201.0).abs() < 1e-9);
        assert!(shapes.iter().all(|&(b, c)| (1.0..=1000.0).contains(&b) && (1.0..=1000.0).contains(&c)));
    }

    #[test]
    fn offsets_are_capped_by_bounds() {
        let bounds = ParamBounds::default();
        let shapes = component_shapes(&window(5000.0), &bounds, &SeedOptions::default()).unwrap();
        let b_max = shapes.iter().map(|s| s.0).fold(f64::MIN, f64::max);
        assert!((b_max - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn pairs_are_unordered() {
        let pairs = pair_indices(3);
        assert_eq!(pairs, vec![(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)]);
        assert!(pair_indices(0).is_empty());
    }
}
