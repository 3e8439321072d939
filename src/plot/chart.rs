//! Overlay chart rendering to an image file.

use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use crate::domain::PlotConfig;
use crate::error::AppError;
use crate::plot::Overlay;
use crate::plot::glyph::GlyphText;

const OBSERVED_RADIUS: i32 = 3;

/// Output encoding, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Svg,
    /// PNG/JPEG/BMP; the encoder follows the extension.
    Raster,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "svg" => Ok(Self::Svg),
            "png" | "jpg" | "jpeg" | "bmp" => Ok(Self::Raster),
            _ => Err(AppError::usage(format!(
                "Unsupported image extension for '{}' (use .png, .jpg, .bmp or .svg).",
                path.display()
            ))),
        }
    }
}

/// Render the overlay to `config.output` and return the written path.
pub fn render_overlay(overlay: &Overlay, config: &PlotConfig) -> Result<PathBuf, AppError> {
    config.validate()?;
    let path = config.output.as_path();
    let format = ImageFormat::from_path(path)?;
    ensure_parent_exists(path)?;

    let size = (config.width, config.height);
    match format {
        ImageFormat::Svg => present(SVGBackend::new(path, size).into_drawing_area(), overlay, path)?,
        ImageFormat::Raster => present(
            GlyphText::new(BitMapBackend::new(path, size)).into_drawing_area(),
            overlay,
            path,
        )?,
    }

    info!(path = %path.display(), ?format, "plot written");
    Ok(path.to_path_buf())
}

fn present<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, overlay: &Overlay, path: &Path) -> Result<(), AppError> {
    draw_overlay(&root, overlay)
        .and_then(|_| root.present())
        .map_err(|e| AppError::render(format!("Failed to render plot '{}': {e}", path.display())))
}

fn ensure_parent_exists(path: &Path) -> Result<(), AppError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => Err(AppError::render(format!(
            "Output directory '{}' does not exist.",
            parent.display()
        ))),
        _ => Ok(()),
    }
}

/// Draw the overlay onto any Plotters drawing area.
pub fn draw_overlay<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    overlay: &Overlay,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let (x0, x1) = overlay.x_range;
    let mut chart = ChartBuilder::on(root)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(x0..x1, 0.0..overlay.ymax)?;

    chart
        .configure_mesh()
        .x_desc("date")
        .y_desc("total infected")
        .x_labels(8)
        .y_labels(10)
        .x_label_formatter(&|d| overlay.date_label(*d))
        .y_label_formatter(&|v| format!("{v:.0}"))
        .axis_desc_style(("sans-serif", 16))
        .label_style(("sans-serif", 13))
        .draw()?;

    let observed_style = GREEN.stroke_width(1);
    chart
        .draw_series(
            overlay
                .visible_observed()
                .map(|p| Circle::new(p, OBSERVED_RADIUS, observed_style)),
        )?
        .label(overlay.label.as_str())
        .legend(move |(x, y)| Circle::new((x, y), OBSERVED_RADIUS, observed_style));

    let curve_style = RED.stroke_width(2);
    chart
        .draw_series(LineSeries::new(overlay.clipped_curve(), curve_style))?
        .label(overlay.label.as_str())
        .legend(move |(x, y)| PathElement::new(vec![(x - 10, y), (x + 10, y)], curve_style));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font(("sans-serif", 14))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{WaveOptions, default_wave_params, generate_waves};
    use crate::error::ErrorKind;

    fn overlay() -> Overlay {
        let series = generate_waves("SYN", &WaveOptions { days: 120, ..WaveOptions::default() }).unwrap();
        Overlay::new(&series, &default_wave_params(), 100, 2.5e6, 200)
    }

    fn config(output: PathBuf) -> PlotConfig {
        PlotConfig {
            output,
            width: 640,
            height: 480,
            ..PlotConfig::default()
        }
    }

    #[test]
    fn writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.png");
        let written = render_overlay(&overlay(), &config(path.clone())).unwrap();
        assert_eq!(written, path);
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.svg");
        render_overlay(&overlay(), &config(path.clone())).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.contains("total infected"));
        assert!(text.contains("SYN"));
    }

    #[test]
    fn missing_directory_is_render_error() {
        let err = render_overlay(&overlay(), &config(PathBuf::from("/nonexistent/dir/fit.png"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
    }

    #[test]
    fn unknown_extension_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_overlay(&overlay(), &config(dir.path().join("fit.pdf"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ImageFormat::from_path(Path::new("a.SVG")).unwrap(), ImageFormat::Svg);
        assert_eq!(ImageFormat::from_path(Path::new("a.jpeg")).unwrap(), ImageFormat::Raster);
        assert!(ImageFormat::from_path(Path::new("noext")).is_err());
    }
}
