//! Dataset providers.
//!
//! Every source yields the same thing: a labeled, date-sorted
//! `ObservationSeries`. The fit/plot pipeline only sees the trait.

pub mod remote;
pub mod sample;

use std::path::PathBuf;

use crate::domain::{ColumnSpec, ObservationSeries};
use crate::error::AppError;
use crate::io::ingest::load_series_from_path;

pub use remote::*;
pub use sample::*;

/// A source of cumulative case observations.
pub trait DatasetProvider {
    /// Short label used in logs and plot legends.
    fn label(&self) -> &str;

    /// Load the full series. Failures are `DataUnavailable`.
    fn load(&self) -> Result<ObservationSeries, AppError>;
}

/// A local CSV file.
#[derive(Debug, Clone)]
pub struct CsvFile {
    pub label: String,
    pub path: PathBuf,
    pub columns: ColumnSpec,
}

impl DatasetProvider for CsvFile {
    fn label(&self) -> &str {
        &self.label
    }

    fn load(&self) -> Result<ObservationSeries, AppError> {
        load_series_from_path(&self.path, &self.label, &self.columns)
    }
}
