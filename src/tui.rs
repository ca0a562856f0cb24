use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::analysis::{self, AnalysisReport, REPORT_FILE, SymbolReport};
use crate::indicators::RsiZone;
use crate::market_data::PriceSource;
use crate::storage_utils::{AppConfig, AsyncStorageManager};

/// Everything a background refresh needs.
pub struct PipelineContext {
    pub config: AppConfig,
    pub storage: AsyncStorageManager,
    pub source: Arc<dyn PriceSource>,
}

// --- Views ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Rsi,
    DeviationFromMax,
    DeviationFromMin,
    LocalExtrema,
}

const VIEWS: [View; 4] = [
    View::Rsi,
    View::DeviationFromMax,
    View::DeviationFromMin,
    View::LocalExtrema,
];

impl View {
    fn title(self) -> &'static str {
        match self {
            View::Rsi => "Relative Strength Index",
            View::DeviationFromMax => "Deviation from Max",
            View::DeviationFromMin => "Deviation from Min",
            View::LocalExtrema => "Local Extrema",
        }
    }

    fn value_header(self) -> &'static str {
        match self {
            View::Rsi => "RSI",
            View::DeviationFromMax => "From Max (%)",
            View::DeviationFromMin => "From Min (%)",
            View::LocalExtrema => "Last Max / Last Min",
        }
    }

    /// Sort key, highest first. Rows without a value sink to the bottom.
    fn sort_key(self, r: &SymbolReport) -> Option<f64> {
        match self {
            View::Rsi => r.rsi,
            View::DeviationFromMax => r.deviation.map(|d| d.deviation_from_max),
            View::DeviationFromMin => r.deviation.map(|d| d.deviation_from_min),
            View::LocalExtrema => Some((r.maxima_count + r.minima_count) as f64),
        }
    }

    fn format(self, r: &SymbolReport) -> String {
        match self {
            View::Rsi => match (r.rsi, r.rsi_zone) {
                (Some(v), Some(zone)) => format!("{:.2} ({})", v, zone.label()),
                _ => "N/A".to_string(),
            },
            View::DeviationFromMax | View::DeviationFromMin => match self.sort_key(r) {
                Some(pct) => format!("{:.2}%", pct),
                None => "N/A".to_string(),
            },
            View::LocalExtrema => {
                let fmt = |p: Option<crate::price_series::PricePoint>| {
                    p.map_or_else(
                        || "-".to_string(),
                        |p| format!("{:.2} @ {}", p.close, p.timestamp.format("%d-%m-%Y")),
                    )
                };
                format!("{} / {}", fmt(r.last_local_max), fmt(r.last_local_min))
            }
        }
    }

    fn color(self, r: &SymbolReport) -> Color {
        match self {
            View::Rsi => match r.rsi_zone {
                Some(RsiZone::Overbought) => Color::Red,
                Some(RsiZone::Oversold) => Color::Green,
                Some(RsiZone::Neutral) => Color::Gray,
                None => Color::DarkGray,
            },
            View::DeviationFromMax | View::DeviationFromMin | View::LocalExtrema => Color::Green,
        }
    }
}

fn sorted_rows(report: &AnalysisReport, view: View) -> Vec<&SymbolReport> {
    let mut rows: Vec<&SymbolReport> = report.reports.iter().collect();
    rows.sort_by(|a, b| match (view.sort_key(a), view.sort_key(b)) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    rows
}

// --- App State ---

struct App {
    data: Option<AnalysisReport>,
    is_refreshing: bool,
    last_error: Option<String>,
    selected_view_index: usize,
}

impl App {
    fn new(data: Option<AnalysisReport>) -> Self {
        Self {
            data,
            is_refreshing: false,
            last_error: None,
            selected_view_index: 0,
        }
    }

    fn view(&self) -> View {
        VIEWS[self.selected_view_index % VIEWS.len()]
    }

    fn set_result(&mut self, result: Result<AnalysisReport>) {
        match result {
            Ok(report) => {
                self.data = Some(report);
                self.last_error = None;
            }
            Err(e) => {
                warn!(error = %e, "refresh failed");
                self.last_error = Some(e.to_string());
            }
        }
        self.is_refreshing = false;
    }
}

enum KeyAction {
    Quit,
    Refresh,
    None,
}

fn handle_key_event(key: KeyEvent, app: &mut App) -> KeyAction {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return KeyAction::Quit,
        KeyCode::F(5) if !app.is_refreshing => {
            app.is_refreshing = true;
            return KeyAction::Refresh;
        }
        KeyCode::Up => {
            app.selected_view_index = app
                .selected_view_index
                .checked_sub(1)
                .unwrap_or(VIEWS.len() - 1);
        }
        KeyCode::Down => {
            app.selected_view_index = (app.selected_view_index + 1) % VIEWS.len();
        }
        KeyCode::Char(c) => {
            let digit = c.to_digit(10).unwrap_or(0) as usize;
            if digit > 0 && digit <= VIEWS.len() {
                app.selected_view_index = digit - 1;
            }
        }
        _ => {}
    }
    KeyAction::None
}

// --- TUI ---

pub async fn run_tui(ctx: Arc<PipelineContext>) -> Result<()> {
    let initial = ctx.storage.load::<AnalysisReport>(REPORT_FILE).await.ok();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, ctx, App::new(initial)).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    ctx: Arc<PipelineContext>,
    mut app: App,
) -> Result<()> {
    let (data_tx, mut data_rx) = mpsc::channel::<Result<AnalysisReport>>(1);

    loop {
        terminal.draw(|f| ui(f, &app))?;

        if let Ok(result) = data_rx.try_recv() {
            app.set_result(result);
        }

        // Resize events need no handling: the next draw picks up the new size.
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                match handle_key_event(key, &mut app) {
                    KeyAction::Quit => return Ok(()),
                    KeyAction::Refresh => {
                        let tx = data_tx.clone();
                        let ctx = Arc::clone(&ctx);
                        tokio::spawn(async move {
                            let result = analysis::run_analysis_pipeline(
                                &ctx.config,
                                &ctx.storage,
                                ctx.source.as_ref(),
                            )
                            .await;
                            let _ = tx.send(result).await;
                        });
                    }
                    KeyAction::None => {}
                }
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let main_layout = Layout::horizontal([Constraint::Percentage(22), Constraint::Percentage(78)])
        .split(f.size());
    let right_chunks =
        Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).split(main_layout[1]);

    let sidebar_block = Block::default().borders(Borders::ALL).title("Indicators");
    let inner_sidebar_area = sidebar_block.inner(main_layout[0]);
    f.render_widget(sidebar_block, main_layout[0]);

    let sidebar_chunks =
        Layout::vertical([Constraint::Min(1), Constraint::Length(2)]).split(inner_sidebar_area);

    let view_lines: Vec<Line> = VIEWS
        .iter()
        .enumerate()
        .map(|(i, view)| {
            let line = Line::from(format!("{}. {}", i + 1, view.title()));
            if i == app.selected_view_index {
                line.style(Style::default().fg(Color::Yellow).bg(Color::DarkGray))
            } else {
                line
            }
        })
        .collect();
    f.render_widget(Paragraph::new(view_lines), sidebar_chunks[0]);
    f.render_widget(
        Paragraph::new("F5 refreshes data\nq quits").alignment(Alignment::Center),
        sidebar_chunks[1],
    );

    let status = match (&app.data, &app.last_error) {
        (_, Some(err)) => format!("Refresh failed: {}", err),
        (Some(report), None) => format!(
            "Last Updated: {} UTC | {} analyzed, {} skipped",
            report.generated_at.format("%d-%m-%Y %H:%M:%S"),
            report.reports.len(),
            report.failures.len()
        ),
        (None, None) => "No report yet, press F5".to_string(),
    };
    f.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .title_alignment(Alignment::Center)
            .title(status),
        right_chunks[0],
    );

    let view = app.view();
    let header = Row::new([
        Cell::from("Rank"),
        Cell::from("Asset"),
        Cell::from("Samples"),
        Cell::from(view.value_header()),
    ])
    .style(Style::default().bg(Color::DarkGray));

    let rows: Vec<Row> = app
        .data
        .as_ref()
        .map(|report| sorted_rows(report, view))
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            Row::new([
                Cell::from(format!("{}", i + 1)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(r.symbol.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(r.samples.to_string()).style(Style::default().fg(Color::Gray)),
                Cell::from(view.format(r)).style(Style::default().fg(view.color(r))),
            ])
            .height(1)
        })
        .collect();

    f.render_widget(
        Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Percentage(25),
                Constraint::Length(9),
                Constraint::Percentage(60),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(view.title())),
        right_chunks[1],
    );

    if app.is_refreshing {
        let area = centered_rect(60, 20, main_layout[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new("Running analysis pipeline...\nPlease wait.")
                .block(Block::default().title("Refreshing").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
