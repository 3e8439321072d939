//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the observation series and its fit window
//! - model parameters and their bounds
//! - fit / plot configuration and fit outputs (`SigmoidFit`, `FitFile`)

pub mod types;

pub use types::*;
