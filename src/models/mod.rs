//! Two-wave logistic growth model.
//!
//! The model is implemented as small, pure functions so that fitting,
//! plotting and export code can share one evaluation path.

pub mod model;

pub use model::*;
