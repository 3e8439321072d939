//! Reporting utilities: formatted terminal output for a fit run.

pub mod format;

pub use format::*;
