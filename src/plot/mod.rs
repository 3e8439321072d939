//! Observed-vs-fitted overlay chart.
//!
//! `Overlay` holds everything a renderer needs in plain numbers (x in days
//! since the series start). The image renderer (`chart`) and the terminal
//! viewer (`tui`) both draw from it.

pub mod chart;
pub mod glyph;

use chrono::NaiveDateTime;

use crate::domain::{ObservationSeries, SigmoidParams, date_after_days};
use crate::models::sample_curve;

pub use chart::*;

/// Tick label layout for the date axis.
pub const DATE_TICK_FORMAT: &str = "%Y-%m-%d";

/// Render-ready chart data.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub label: String,
    pub start: NaiveDateTime,
    /// Every observation as `(days since start, total cases)`.
    pub observed: Vec<(f64, f64)>,
    /// The fitted curve sampled over `[0, fitted_days]`.
    pub curve: Vec<(f64, f64)>,
    pub x_range: (f64, f64),
    pub ymax: f64,
}

impl Overlay {
    /// Build the overlay for the full series and a fitted curve.
    ///
    /// The x range runs from the first observation to the later of the last
    /// observation and the end of the fit window.
    pub fn new(series: &ObservationSeries, params: &SigmoidParams, fitted_days: usize, ymax: f64, samples: usize) -> Self {
        let observed: Vec<(f64, f64)> = series
            .elapsed_days()
            .into_iter()
            .zip(series.observations())
            .map(|(t, o)| (t, o.total_cases))
            .collect();
        let curve = sample_curve(params, fitted_days as f64, samples);

        let last = observed.last().map_or(0.0, |p| p.0);
        let x_max = last.max(fitted_days as f64);
        // A single observation with no window still needs a non-empty axis.
        let x_max = if x_max > 0.0 { x_max } else { 1.0 };

        Self {
            label: series.label().to_string(),
            start: series.start(),
            observed,
            curve,
            x_range: (0.0, x_max),
            ymax,
        }
    }

    /// Observations inside the y range.
    pub fn visible_observed(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.observed
            .iter()
            .copied()
            .filter(|&(_, y)| (0.0..=self.ymax).contains(&y))
    }

    /// Curve points with values capped to the y range.
    pub fn clipped_curve(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.curve.iter().map(|&(x, y)| (x, y.clamp(0.0, self.ymax)))
    }

    /// Calendar label for an x position.
    pub fn date_label(&self, day: f64) -> String {
        format_day(self.start, day)
    }
}

/// Format `day` days after `start` as a calendar date.
///
/// Positions past the calendar range fall back to a day offset.
pub fn format_day(start: NaiveDateTime, day: f64) -> String {
    match date_after_days(start, day) {
        Some(date) => date.format(DATE_TICK_FORMAT).to_string(),
        None => format!("+{day:.0}d"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use chrono::NaiveDate;

    fn series(days: &[i64]) -> ObservationSeries {
        let start = NaiveDate::from_ymd_opt(2020, 2, 24).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let obs = days
            .iter()
            .map(|&d| Observation {
                timestamp: start + chrono::Duration::days(d),
                total_cases: 1000.0 * (d + 1) as f64,
            })
            .collect();
        ObservationSeries::new("ITA", obs).unwrap()
    }

    fn params() -> SigmoidParams {
        SigmoidParams {
            a1: 5e5,
            b1: 25.0,
            c1: 4.0,
            a2: 1.5e6,
            b2: 70.0,
            c2: 8.0,
        }
    }

    #[test]
    fn x_range_covers_the_fit_window() {
        let overlay = Overlay::new(&series(&[0, 1, 2, 3, 4]), &params(), 100, 2.5e6, 200);
        assert_eq!(overlay.x_range, (0.0, 100.0));
        assert_eq!(overlay.observed.len(), 5);
        assert_eq!(overlay.curve.len(), 200);
        assert_eq!(overlay.curve.last().unwrap().0, 100.0);
    }

    #[test]
    fn x_range_covers_the_series() {
        let overlay = Overlay::new(&series(&[0, 150, 300]), &params(), 100, 2.5e6, 200);
        assert_eq!(overlay.x_range, (0.0, 300.0));
    }

    #[test]
    fn points_above_ymax_are_hidden() {
        let overlay = Overlay::new(&series(&[0, 1, 2]), &params(), 10, 2500.0, 20);
        assert_eq!(overlay.visible_observed().count(), 2);
        assert!(overlay.clipped_curve().all(|(_, y)| y <= 2500.0));
    }

    #[test]
    fn date_labels() {
        let overlay = Overlay::new(&series(&[0, 1]), &params(), 10, 2.5e6, 20);
        assert_eq!(overlay.date_label(0.0), "2020-02-24");
        assert_eq!(overlay.date_label(6.0), "2020-03-01");
        assert_eq!(overlay.date_label(2.0e8), "+200000000d");
    }
}
