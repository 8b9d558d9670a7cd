// Weatherwire CLI - Terminal dashboard
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Terminal dashboard for the consumer: two line charts and a message log,
//! plus the quit listener that fires the pipeline's cancellation token.

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures_util::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::Line;
use ratatui::widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph};
use ratatui::Terminal;
use std::io::{self, Stdout};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use weatherwire::window::DEFAULT_CAPACITY;
use weatherwire::{DisplaySink, LogLine, LogRing, Sample, SlidingWindow};

/// Full-screen dashboard. The terminal is restored on drop.
pub struct TerminalSink {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSink {
    /// Switch the terminal to the alternate screen and draw an empty dashboard.
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let terminal = undo_on_error(alternate_screen(), || {
            let _ = disable_raw_mode();
        })?;

        // From here on, Drop restores the terminal
        let mut sink = Self { terminal };
        sink.terminal.clear()?;
        sink.update(
            &SlidingWindow::new(DEFAULT_CAPACITY),
            &SlidingWindow::new(DEFAULT_CAPACITY),
            &LogRing::new(DEFAULT_CAPACITY),
        )?;
        Ok(sink)
    }
}

fn alternate_screen() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    undo_on_error(Terminal::new(CrosstermBackend::new(stdout)), || {
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    })
}

/// Run `undo` when `result` is an error, then pass `result` through.
fn undo_on_error<T>(result: io::Result<T>, undo: impl FnOnce()) -> io::Result<T> {
    if result.is_err() {
        undo();
    }
    result
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

impl DisplaySink for TerminalSink {
    fn update(
        &mut self,
        temperature: &SlidingWindow<Sample>,
        humidity: &SlidingWindow<Sample>,
        log: &LogRing<LogLine>,
    ) -> io::Result<()> {
        let temperature_points = points(temperature);
        let humidity_points = points(humidity);
        let lines: Vec<Line> = log.iter().map(|line| Line::from(line.as_str())).collect();

        self.terminal.draw(|frame| {
            let [top, middle, bottom] = Layout::vertical([
                Constraint::Percentage(35),
                Constraint::Percentage(35),
                Constraint::Percentage(30),
            ])
            .areas(frame.area());

            frame.render_widget(
                line_chart(
                    "Temperature (°C)",
                    &temperature_points,
                    temperature,
                    Color::Red,
                ),
                top,
            );
            frame.render_widget(
                line_chart("Humidity (%)", &humidity_points, humidity, Color::Cyan),
                middle,
            );
            frame.render_widget(
                Paragraph::new(lines)
                    .block(Block::bordered().title("Messages (q to quit)")),
                bottom,
            );
        })?;
        Ok(())
    }
}

/// Chart points: sample position on x, value on y
fn points(window: &SlidingWindow<Sample>) -> Vec<(f64, f64)> {
    window
        .iter()
        .enumerate()
        .map(|(i, sample)| (i as f64, sample.value))
        .collect()
}

fn line_chart<'a>(
    title: &'a str,
    data: &'a [(f64, f64)],
    window: &SlidingWindow<Sample>,
    color: Color,
) -> Chart<'a> {
    let (lo, hi) = window
        .value_range()
        .map(|(lo, hi)| (lo - 1.0, hi + 1.0))
        .unwrap_or((0.0, 1.0));

    let dataset = Dataset::default()
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(data);

    Chart::new(vec![dataset])
        .block(Block::bordered().title(title))
        .x_axis(Axis::default().bounds([0.0, window.capacity().saturating_sub(1) as f64]))
        .y_axis(
            Axis::default()
                .bounds([lo, hi])
                .labels([format!("{:.1}", lo), format!("{:.1}", hi)]),
        )
}

fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Wait for a quit key or an interrupt, then cancel `cancel` once.
pub async fn quit_listener(cancel: CancellationToken) {
    let mut events = EventStream::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if is_quit(&key) => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Terminal input failed");
                    break;
                }
                None => break,
            },
        }
    }
    info!("Quit requested");
    cancel.cancel();
}
