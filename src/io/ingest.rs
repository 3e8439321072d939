//! CSV ingest and normalization.
//!
//! This module turns a cumulative-case CSV into an `ObservationSeries`.
//!
//! Design goals:
//! - **Strict schema**: the date and cases columns must exist
//! - **Strict rows**: one malformed row fails the whole load (exit code 3);
//!   a partially parsed epidemic curve would silently bias the fit
//! - **Deterministic behavior**: rows are sorted by timestamp, stable
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::debug;

use crate::domain::{ColumnSpec, Observation, ObservationSeries};
use crate::error::AppError;

/// Date-time layouts tried in order.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
/// Date-only layouts, normalized to midnight.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Load a series from a CSV file on disk.
pub fn load_series_from_path(path: &Path, label: &str, columns: &ColumnSpec) -> Result<ObservationSeries, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::data_unavailable(format!("Failed to open CSV '{}': {e}", path.display())))?;
    load_series_from_reader(file, label, columns)
}

/// Load a series from an in-memory CSV body (e.g. a downloaded file).
pub fn load_series_from_bytes(bytes: &[u8], label: &str, columns: &ColumnSpec) -> Result<ObservationSeries, AppError> {
    load_series_from_reader(bytes, label, columns)
}

/// Load a series from any CSV reader.
pub fn load_series_from_reader<R: Read>(
    reader: R,
    label: &str,
    columns: &ColumnSpec,
) -> Result<ObservationSeries, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::data_unavailable(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let date_idx = require_column(&header_map, &columns.date)?;
    let cases_idx = require_column(&header_map, &columns.cases)?;

    let mut observations = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; CSV lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::data_unavailable(format!("CSV parse error on line {line}: {e}")))?;
        let observation = parse_row(&record, date_idx, cases_idx)
            .map_err(|e| AppError::data_unavailable(format!("Invalid row on line {line}: {e}")))?;
        observations.push(observation);
    }

    debug!(label, rows = observations.len(), "parsed CSV series");

    if observations.is_empty() {
        return Err(AppError::data_unavailable("CSV contains no data rows."));
    }
    ObservationSeries::new(label, observations)
}

fn parse_row(record: &StringRecord, date_idx: usize, cases_idx: usize) -> Result<Observation, String> {
    let raw_date = record.get(date_idx).unwrap_or("").trim();
    let raw_cases = record.get(cases_idx).unwrap_or("").trim();

    let timestamp = parse_timestamp(raw_date).ok_or_else(|| format!("unrecognized date '{raw_date}'"))?;
    let total_cases = parse_cases(raw_cases).ok_or_else(|| format!("invalid case count '{raw_cases}'"))?;

    Ok(Observation { timestamp, total_cases })
}

/// Parse a timestamp in one of the accepted layouts.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a finite, non-negative case count.
pub fn parse_cases(raw: &str) -> Option<f64> {
    let v = raw.trim().parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 { Some(v) } else { None }
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| AppError::data_unavailable(format!("Missing required column '{name}'.")))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for duplicated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn load(body: &str) -> Result<ObservationSeries, AppError> {
        load_series_from_bytes(body.as_bytes(), "ITA", &ColumnSpec::default())
    }

    #[test]
    fn parses_the_national_layout() {
        let body = "\
data,stato,totale_casi,tamponi
2020-02-24T18:00:00,ITA,229,4324
2020-02-25T18:00:00,ITA,322,8623
2020-02-26T18:00:00,ITA,400,9587
";
        let series = load(body).unwrap();
        assert_eq!(series.label(), "ITA");
        assert_eq!(series.len(), 3);
        assert_eq!(series.observations()[0].total_cases, 229.0);
        assert_eq!(series.elapsed_days(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn sorts_rows_by_timestamp() {
        let body = "data,totale_casi\n2020-03-03,30\n2020-03-01,10\n2020-03-02,20\n";
        let series = load(body).unwrap();
        let cases: Vec<f64> = series.observations().iter().map(|o| o.total_cases).collect();
        assert_eq!(cases, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn custom_columns_and_header_normalization() {
        let body = "\u{feff} Date ,Confirmed\n01/03/2020,5\n02/03/2020,8\n";
        let columns = ColumnSpec {
            date: "date".to_string(),
            cases: "CONFIRMED".to_string(),
        };
        let series = load_series_from_bytes(body.as_bytes(), "X", &columns).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.start(), NaiveDate::from_ymd_opt(2020, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn missing_column_is_data_unavailable() {
        let err = load("date,cases\n2020-03-01,1\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        assert!(err.to_string().contains("data"));
    }

    #[test]
    fn malformed_rows_are_data_unavailable() {
        for body in [
            "data,totale_casi\n2020-03-01,1\nnot-a-date,2\n",
            "data,totale_casi\n2020-03-01,abc\n",
            "data,totale_casi\n2020-03-01,-5\n",
            "data,totale_casi\n2020-03-01,NaN\n",
        ] {
            let err = load(body).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DataUnavailable, "body: {body}");
        }
    }

    #[test]
    fn header_only_is_data_unavailable() {
        let err = load("data,totale_casi\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let err = load_series_from_path(Path::new("/nonexistent/epi.csv"), "X", &ColumnSpec::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn timestamp_layouts() {
        let midnight = NaiveDate::from_ymd_opt(2020, 2, 24).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2020-02-24"), Some(midnight));
        assert_eq!(parse_timestamp("24/02/2020"), Some(midnight));
        assert_eq!(parse_timestamp("2020/02/24"), Some(midnight));
        assert_eq!(
            parse_timestamp("2020-02-24 18:00:00"),
            NaiveDate::from_ymd_opt(2020, 2, 24).unwrap().and_hms_opt(18, 0, 0)
        );
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("Feb 24").is_none());
    }
}
