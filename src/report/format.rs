//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use std::path::Path;

use crate::domain::{ObservationSeries, PARAM_NAMES, SigmoidFit};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format the full run summary (dataset + window + parameters + diagnostics).
pub fn format_run_summary(
    series: &ObservationSeries,
    fit: &SigmoidFit,
    fitted_days: usize,
    image: Option<&Path>,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== epi - two-wave logistic fit ({}) ===\n", series.label()));
    out.push_str(&format!(
        "Series: n={} | {} .. {} ({:.1} days)\n",
        series.len(),
        series.start().format(DATE_FORMAT),
        series.end().format(DATE_FORMAT),
        series.elapsed_days().last().copied().unwrap_or(0.0),
    ));
    out.push_str(&format!(
        "Window: first {} of {fitted_days} requested rows\n",
        fit.quality.n
    ));

    out.push_str("\nParameters:\n");
    let values = fit.params.to_array();
    let errors = fit.std_errors();
    for (i, name) in PARAM_NAMES.iter().enumerate() {
        let line = match errors {
            Some(se) => format!("  {name} = {:>14} ± {}\n", fmt_value(values[i]), fmt_value(se[i])),
            None => format!("  {name} = {:>14}\n", fmt_value(values[i])),
        };
        out.push_str(&line);
    }
    if errors.is_none() {
        out.push_str("  (standard errors need more rows than parameters)\n");
    }

    out.push_str("\nDiagnostics:\n");
    for line in summary_lines(fit) {
        out.push_str(&format!("  {line}\n"));
    }

    if let Some(path) = image {
        out.push_str(&format!("\nPlot: {}\n", path.display()));
    }

    out
}

/// Compact fit diagnostics (also used by the terminal viewer header).
pub fn summary_lines(fit: &SigmoidFit) -> Vec<String> {
    let p = &fit.params;
    vec![
        format!(
            "wave 1: a={} b={:.2} c={:.2} | wave 2: a={} b={:.2} c={:.2}",
            fmt_value(p.a1),
            p.b1,
            p.c1,
            fmt_value(p.a2),
            p.b2,
            p.c2
        ),
        format!(
            "SSE={:.4e} RMSE={:.1} R^2={:.5} | evals={} start={:?}",
            fit.quality.sse, fit.quality.rmse, fit.quality.r_squared, fit.evaluations, fit.start
        ),
    ]
}

/// Plain decimal for case-sized values, scientific for the rest.
fn fmt_value(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1e-3..1e9).contains(&a) {
        format!("{v:.4e}")
    } else if a >= 1000.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.4}")
    }
}
