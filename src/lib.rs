//! `epi-curves` library crate.
//!
//! The binary (`epi`) is a thin wrapper around this library so that:
//!
//! - the fit and plot pipeline is testable without spawning processes
//! - data sources, the fitter and the renderers stay reusable on their own

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
