//! Plotters-powered overlay chart widget for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using
//! `plotters-ratatui-backend`, so the terminal view and the saved image share
//! the same chart vocabulary (mesh, line series, markers).

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::plot::Overlay;

/// Render-only view of an `Overlay`.
pub struct OverlayChart<'a> {
    pub overlay: &'a Overlay,
}

impl Widget for OverlayChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() {
            return;
        }
        // Plotters may fail to lay out a chart in very small areas.
        if area.width < 20 || area.height < 8 {
            buf.set_stringn(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                area.width as usize,
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let overlay = self.overlay;
        let (x0, x1) = overlay.x_range;
        let ymax = overlay.ymax;
        if !(x0.is_finite() && x1.is_finite() && ymax.is_finite()) || x1 <= x0 || ymax <= 0.0 {
            return;
        }

        let widget = widget_fn(move |root| {
            // Tick labels are drawn by the caller as terminal text.
            let mut chart = ChartBuilder::on(&root).margin(1).build_cartesian_2d(x0..x1, 0.0..ymax)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_labels(0)
                .y_labels(0)
                .axis_style(&WHITE)
                .draw()?;

            chart.draw_series(LineSeries::new(overlay.clipped_curve(), RGBColor(255, 0, 0)))?;

            // `Circle` radii are mis-scaled by the terminal backend; a pixel
            // per observation reads better at cell resolution.
            chart.draw_series(
                overlay
                    .visible_observed()
                    .map(|p| Pixel::new(p, RGBColor(0, 255, 0))),
            )?;

            Ok(())
        });

        widget.render(area, buf);
    }
}
