//! Read/write fit JSON files.
//!
//! A fit file is the portable record of one successful fit:
//! - parameters, quality, covariance and solver diagnostics
//! - run metadata (label, series start, window length, bounds)
//! - a precomputed curve grid for quick plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{CurveGrid, FitFile, ObservationSeries, ParamBounds, SigmoidFit};
use crate::error::AppError;
use crate::models::sample_curve;

pub const TOOL_NAME: &str = "epi";

/// Assemble the fit file for a series.
pub fn build_fit_file(
    series: &ObservationSeries,
    fit: &SigmoidFit,
    fitted_days: usize,
    bounds: &ParamBounds,
    samples: usize,
) -> FitFile {
    let (days, total_cases) = sample_curve(&fit.params, fitted_days as f64, samples)
        .into_iter()
        .unzip();
    FitFile {
        tool: TOOL_NAME.to_string(),
        label: series.label().to_string(),
        series_start: series.start(),
        fitted_days,
        bounds: *bounds,
        fit: fit.clone(),
        grid: CurveGrid { days, total_cases },
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, file: &FitFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::render(format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut writer, file)
        .map_err(|e| AppError::render(format!("Failed to write fit JSON: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::render(format!("Failed to flush fit JSON '{}': {e}", path.display())))?;
    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::data_unavailable(format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::data_unavailable(format!("Invalid fit JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, FitStart, Observation, SigmoidParams};
    use crate::error::ErrorKind;
    use chrono::NaiveDate;

    fn series() -> ObservationSeries {
        let start = NaiveDate::from_ymd_opt(2020, 2, 24).unwrap().and_hms_opt(18, 0, 0).unwrap();
        ObservationSeries::new(
            "ITA",
            vec![Observation {
                timestamp: start,
                total_cases: 229.0,
            }],
        )
        .unwrap()
    }

    fn fit() -> SigmoidFit {
        SigmoidFit {
            params: SigmoidParams {
                a1: 2.0e5,
                b1: 30.0,
                c1: 5.0,
                a2: 1.0e6,
                b2: 200.0,
                c2: 20.0,
            },
            quality: FitQuality {
                n: 100,
                sse: 1.0e9,
                rmse: 3162.0,
                r_squared: 0.998,
            },
            covariance: None,
            evaluations: 57,
            start: FitStart::Grid(1),
        }
    }

    #[test]
    fn fit_file_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        let file = build_fit_file(&series(), &fit(), 300, &ParamBounds::default(), 200);
        write_fit_json(&path, &file).unwrap();

        let back = read_fit_json(&path).unwrap();
        assert_eq!(back.tool, "epi");
        assert_eq!(back.label, "ITA");
        assert_eq!(back.series_start, series().start());
        assert_eq!(back.fitted_days, 300);
        assert_eq!(back.fit.start, FitStart::Grid(1));
        assert_eq!(back.fit.params.b2, 200.0);
        assert_eq!(back.grid.days.len(), 200);
        assert_eq!(back.grid.days[199], 300.0);
    }

    #[test]
    fn unreadable_fit_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(read_fit_json(&path).unwrap_err().kind(), ErrorKind::DataUnavailable);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_flush_is_render_error() {
        // A small file fits in the buffer; the device only fails on flush.
        let file = build_fit_file(&series(), &fit(), 100, &ParamBounds::default(), 10);
        let err = write_fit_json(Path::new("/dev/full"), &file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
    }

    #[test]
    fn write_into_missing_directory_is_render_error() {
        let file = build_fit_file(&series(), &fit(), 100, &ParamBounds::default(), 10);
        let err = write_fit_json(Path::new("/nonexistent/dir/fit.json"), &file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
    }
}
