//! Shared "fit and plot" pipeline used by the CLI and by tests.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> fit window -> fit -> overlay -> image
//!
//! The CLI then only adds presentation (summary, JSON export, viewer).

use std::path::PathBuf;

use tracing::info;

use crate::data::DatasetProvider;
use crate::domain::{FitConfig, ObservationSeries, PlotConfig, SigmoidFit};
use crate::error::AppError;
use crate::fit::try_fit;
use crate::plot::{Overlay, render_overlay};

/// All computed outputs of a single fit run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// `None` when the fit did not converge (the diagnostic is already logged).
    pub fit: Option<SigmoidFit>,
    /// Written image, present exactly when `fit` is.
    pub image: Option<PathBuf>,
    pub overlay: Option<Overlay>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.fit.is_some()
    }
}

/// Load the series from a provider.
pub fn load_series(provider: &dyn DatasetProvider) -> Result<ObservationSeries, AppError> {
    info!(label = provider.label(), "loading series");
    let series = provider.load()?;
    info!(
        label = series.label(),
        rows = series.len(),
        start = %series.start(),
        end = %series.end(),
        "series loaded"
    );
    Ok(series)
}

/// Fit the leading `fitted_days` rows and, on success, render the overlay.
///
/// Non-convergence is not an error: the result has no fit and no image.
pub fn fit_and_plot(
    series: &ObservationSeries,
    fit_config: &FitConfig,
    plot_config: &PlotConfig,
) -> Result<RunOutput, AppError> {
    fit_config.validate()?;
    plot_config.validate()?;

    let window = series.fit_window(fit_config.fitted_days);
    info!(
        label = series.label(),
        window = window.len(),
        fitted_days = fit_config.fitted_days,
        "fitting two-wave logistic model"
    );

    let Some(fit) = try_fit(&window, fit_config)? else {
        return Ok(RunOutput {
            fit: None,
            image: None,
            overlay: None,
        });
    };
    info!(
        r_squared = fit.quality.r_squared,
        rmse = fit.quality.rmse,
        evaluations = fit.evaluations,
        "fit accepted"
    );

    let overlay = Overlay::new(
        series,
        &fit.params,
        fit_config.fitted_days,
        plot_config.ymax,
        plot_config.curve_samples,
    );
    let image = render_overlay(&overlay, plot_config)?;

    Ok(RunOutput {
        fit: Some(fit),
        image: Some(image),
        overlay: Some(overlay),
    })
}
