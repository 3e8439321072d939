//! Ratatui-based terminal viewer.
//!
//! `epi fit --show` opens this after the image is written: the same overlay
//! drawn with Plotters inside a Ratatui frame, plus the fit summary. It only
//! displays; `q` or `Esc` closes it.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::error::AppError;
use crate::plot::Overlay;

mod plotters_chart;

use plotters_chart::OverlayChart;

/// Show the overlay until the user quits.
pub fn show(overlay: &Overlay, summary: &[String]) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::render(format!("Failed to initialize terminal: {e}")))?;

    let viewer = Viewer { overlay, summary };
    viewer.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::render(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::render(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct Viewer<'a> {
    overlay: &'a Overlay,
    summary: &'a [String],
}

impl Viewer<'_> {
    fn event_loop<B: ratatui::backend::Backend>(&self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::render(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::render(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::render(format!("Event read error: {e}")))? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                        break;
                    }
                }
                Event::Resize(_, _) => needs_redraw = true,
                _ => {}
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let header_height = self.summary.len() as u16 + 3;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(header_height),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);
        self.draw_chart(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines = vec![Line::from(vec![
            Span::styled("epi", Style::default().fg(Color::Cyan)),
            Span::raw(format!(": two-wave logistic fit for {}", self.overlay.label)),
        ])];
        lines.extend(
            self.summary
                .iter()
                .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(Color::Gray)))),
        );
        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Observed vs fitted").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let (chart_rect, insets) = chart_layout(inner);
        frame.render_widget(OverlayChart { overlay: self.overlay }, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, self.overlay);
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let line = Line::from(vec![
            Span::styled("q/Esc quit", Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled("green: observed  red: fitted", Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 10,
        right: 6,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

/// Tick labels drawn as terminal text around the Plotters canvas.
fn draw_axis_ticks(frame: &mut ratatui::Frame<'_>, inner: Rect, chart: Rect, insets: AxisInsets, overlay: &Overlay) {
    let ticks = 4usize;
    let style = Style::default().fg(Color::Gray);
    let (x0, x1) = overlay.x_range;

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = overlay.date_label(x0 + u * (x1 - x0));
        let label_len = label.len() as u16;
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let start = x
            .saturating_sub(label_len / 2)
            .min((inner.x + inner.width).saturating_sub(label_len));
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = format!("{:.0}", u * overlay.ymax);
        let label_len = label.len() as u16;
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("date")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new("total infected").style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: inner.width.min(14),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{WaveOptions, default_wave_params, generate_waves};
    use ratatui::backend::TestBackend;

    fn overlay() -> Overlay {
        let series = generate_waves("SYN", &WaveOptions { days: 60, ..WaveOptions::default() }).unwrap();
        Overlay::new(&series, &default_wave_params(), 100, 2.5e6, 200)
    }

    fn rendered(width: u16, height: u16) -> String {
        let overlay = overlay();
        let summary = vec!["R^2 = 0.999".to_string()];
        let viewer = Viewer {
            overlay: &overlay,
            summary: &summary,
        };
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| viewer.draw(f)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn draws_header_ticks_and_footer() {
        let text = rendered(120, 40);
        assert!(text.contains("two-wave logistic fit for SYN"));
        assert!(text.contains("R^2 = 0.999"));
        assert!(text.contains("2020-02-24"));
        assert!(text.contains("q/Esc quit"));
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let text = rendered(20, 8);
        assert!(!text.is_empty());
    }

    #[test]
    fn layout_reserves_axis_space() {
        let inner = Rect::new(0, 0, 100, 30);
        let (chart, insets) = chart_layout(inner);
        assert!(insets.is_some());
        assert_eq!(chart.x, 10);
        assert_eq!(chart.width, 84);

        let (small, none) = chart_layout(Rect::new(0, 0, 20, 6));
        assert!(none.is_none());
        assert_eq!(small, Rect::new(0, 0, 20, 6));
    }
}
