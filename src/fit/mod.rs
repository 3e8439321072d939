//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - generate seed grids for the nonlinear parameters
//! - evaluate each seed tuple (parallel)
//! - refine the best seeds with a bounded solver and guard the result

pub mod fitter;
pub mod grid;
pub mod solver;

pub use fitter::*;
pub use grid::*;
pub use solver::*;
