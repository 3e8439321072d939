//! Export an observation series to CSV.
//!
//! The layout matches what `io::ingest` reads, so an exported series can be
//! fed straight back into `epi fit --csv`.

use std::path::Path;

use crate::domain::{ColumnSpec, ObservationSeries};
use crate::error::AppError;

/// Timestamp layout of the national dataset.
pub const EXPORT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Write `series` to a CSV file with the given column names.
///
/// Case counts are rounded to whole cases.
pub fn write_series_csv(path: &Path, series: &ObservationSeries, columns: &ColumnSpec) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::render(format!("Failed to create CSV '{}': {e}", path.display())))?;

    writer
        .write_record([columns.date.as_str(), columns.cases.as_str()])
        .map_err(|e| AppError::render(format!("Failed to write CSV header: {e}")))?;

    for o in series.observations() {
        let date = o.timestamp.format(EXPORT_DATETIME_FORMAT).to_string();
        let cases = format!("{:.0}", o.total_cases.round());
        writer
            .write_record([date.as_str(), cases.as_str()])
            .map_err(|e| AppError::render(format!("Failed to write CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::render(format!("Failed to flush CSV '{}': {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{WaveOptions, generate_waves};
    use crate::error::ErrorKind;
    use crate::io::ingest::load_series_from_path;

    #[test]
    fn exported_series_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waves.csv");
        let series = generate_waves("SYN", &WaveOptions { days: 30, ..WaveOptions::default() }).unwrap();
        write_series_csv(&path, &series, &ColumnSpec::default()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("data,totale_casi\n2020-02-24T00:00:00,"));

        let back = load_series_from_path(&path, "SYN", &ColumnSpec::default()).unwrap();
        assert_eq!(back.len(), 30);
        assert_eq!(back.start(), series.start());
        for (a, b) in back.observations().iter().zip(series.observations()) {
            assert!((a.total_cases - b.total_cases).abs() <= 0.5);
        }
    }

    #[test]
    fn custom_column_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waves.csv");
        let series = generate_waves("SYN", &WaveOptions { days: 3, ..WaveOptions::default() }).unwrap();
        let columns = ColumnSpec {
            date: "day".to_string(),
            cases: "confirmed".to_string(),
        };
        write_series_csv(&path, &series, &columns).unwrap();
        assert_eq!(load_series_from_path(&path, "SYN", &columns).unwrap().len(), 3);
    }

    #[test]
    fn missing_directory_is_render_error() {
        let series = generate_waves("SYN", &WaveOptions { days: 3, ..WaveOptions::default() }).unwrap();
        let err = write_series_csv(Path::new("/nonexistent/dir/x.csv"), &series, &ColumnSpec::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
    }
}
