//! Mathematical utilities: logistic terms and least squares.

pub mod logistic;
pub mod ols;

pub use logistic::*;
pub use ols::*;
