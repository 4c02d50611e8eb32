use chainflow_data::{
    ChainCache, ChainClient, ChainKey, CsvHistory, DEFAULT_BASE_URL, DEFAULT_TTL, DISPLAY_TOP_K,
    DashboardFrame, DataError, StrikeRecord, run_cycle,
};
use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, List, ListItem, Paragraph, Sparkline},
};
use std::{io, sync::Arc, time::Duration};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

/// Dashboard configuration, resolved from CLI args and environment variables.
#[derive(Clone, Debug)]
struct Config {
    key: ChainKey,
    base_url: String,
    history_file: String,
    refresh: Duration,
}

impl Config {
    /// Positional symbol argument (default `NIFTY`), `--equity` to switch the
    /// endpoint family; `CHAINFLOW_BASE_URL`, `CHAINFLOW_HISTORY_FILE` and
    /// `CHAINFLOW_REFRESH_SECS` env overrides.
    fn from_env() -> Self {
        let mut symbol: Option<String> = None;
        let mut is_index = true;
        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--equity" => is_index = false,
                "--index" => is_index = true,
                other => symbol = Some(other.to_string()),
            }
        }

        let refresh_secs = std::env::var("CHAINFLOW_REFRESH_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(60)
            .max(1);

        Self {
            key: ChainKey::new(symbol.as_deref().unwrap_or("NIFTY"), is_index),
            base_url: std::env::var("CHAINFLOW_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            history_file: std::env::var("CHAINFLOW_HISTORY_FILE")
                .unwrap_or_else(|_| "pcr_history.csv".to_string()),
            refresh: Duration::from_secs(refresh_secs),
        }
    }
}

/// Application state shared between the refresh task and the render loop.
struct AppState {
    frame: Option<DashboardFrame>,
    /// Last cycle failure. The previous frame stays visible underneath.
    error: Option<DataError>,
    refreshing: bool,
    last_attempt: Option<DateTime<Utc>>,
}

impl AppState {
    fn new() -> Self {
        Self {
            frame: None,
            error: None,
            refreshing: true,
            last_attempt: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    init_logging();
    info!(key = %config.key, refresh_secs = config.refresh.as_secs(), "starting chainflow dashboard");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let state = Arc::new(Mutex::new(AppState::new()));
    let (force_tx, force_rx) = mpsc::channel::<()>(1);

    // External scheduler driving repeated cycles, decoupled from the pipeline
    let refresh_state = state.clone();
    let refresh_config = config.clone();
    tokio::spawn(async move {
        refresh_loop(refresh_config, refresh_state, force_rx).await;
    });

    let res = run_app(&mut terminal, state, &config, force_tx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    let _ = res;

    Ok(())
}

/// Log to a file so tracing output does not corrupt the alternate screen.
fn init_logging() {
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("chainflow-tui.log")
    else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .try_init();
}

/// Run one cycle per refresh interval, or immediately on a forced refresh.
async fn refresh_loop(config: Config, state: Arc<Mutex<AppState>>, mut force_rx: mpsc::Receiver<()>) {
    let client = match ChainClient::with_base_url(&config.base_url) {
        Ok(client) => client,
        Err(error) => {
            let mut s = state.lock().await;
            s.refreshing = false;
            s.error = Some(error);
            return;
        }
    };
    let cache = ChainCache::new(DEFAULT_TTL);
    let mut history = CsvHistory::new(&config.history_file);

    let mut interval = tokio::time::interval(config.refresh);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick resolves immediately; consume it so the wait after the
    // first cycle is a full interval
    interval.tick().await;

    loop {
        {
            let mut s = state.lock().await;
            s.refreshing = true;
        }

        let result = run_cycle(&client, &cache, &mut history, &config.key).await;

        let mut s = state.lock().await;
        s.refreshing = false;
        s.last_attempt = Some(Utc::now());
        match result {
            Ok(frame) => {
                s.error = None;
                s.frame = Some(frame);
            }
            Err(error) => {
                warn!(%error, key = %config.key, "cycle failed");
                s.error = Some(error);
            }
        }
        drop(s);

        tokio::select! {
            _ = interval.tick() => {}
            Some(()) = force_rx.recv() => {
                info!(key = %config.key, "forced refresh");
            }
        }
    }
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    state: Arc<Mutex<AppState>>,
    config: &Config,
    force_tx: mpsc::Sender<()>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = std::time::Instant::now();

    loop {
        let view = {
            let s = state.lock().await;
            ViewState {
                frame: s.frame.clone(),
                error: s.error.clone(),
                refreshing: s.refreshing,
                last_attempt: s.last_attempt,
            }
        };

        terminal.draw(|f| ui(f, &view, config))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('r') => {
                        let _ = force_tx.try_send(());
                    }
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = std::time::Instant::now();
        }
    }
}

/// Render-side copy of the shared state, taken under the lock once per draw.
struct ViewState {
    frame: Option<DashboardFrame>,
    error: Option<DataError>,
    refreshing: bool,
    last_attempt: Option<DateTime<Utc>>,
}

const PANEL_BG: Color = Color::Rgb(15, 15, 25);
const TEXT_DIM: Color = Color::Rgb(128, 128, 150);
const TEXT_MAIN: Color = Color::Rgb(200, 200, 220);
const ACCENT_CALL: Color = Color::Rgb(0, 255, 127);
const ACCENT_PUT: Color = Color::Rgb(255, 69, 58);
const ACCENT_GOLD: Color = Color::Rgb(255, 215, 0);
const ACCENT_BLUE: Color = Color::Rgb(100, 149, 237);

fn ui(f: &mut Frame, view: &ViewState, config: &Config) {
    let size = f.area();

    // Main layout: status bar, metrics strip, main content
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Min(0),
        ])
        .split(size);

    render_status_bar(f, chunks[0], view, config);
    render_metrics(f, chunks[1], view);

    // Left column: call/put tables; right column: PCR trend + messages
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(chunks[2]);

    let table_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_chunks[0]);

    let frame = view.frame.as_ref();
    render_side_table(
        f,
        table_chunks[0],
        "TOP CALL STRIKES BY VOLUME",
        ACCENT_CALL,
        frame.map(|frame| frame.top_calls.as_slice()).unwrap_or(&[]),
    );
    render_side_table(
        f,
        table_chunks[1],
        "TOP PUT STRIKES BY VOLUME",
        ACCENT_PUT,
        frame.map(|frame| frame.top_puts.as_slice()).unwrap_or(&[]),
    );

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(main_chunks[1]);

    render_pcr_trend(f, right_chunks[0], view);
    render_messages(f, right_chunks[1], view, config);
}

fn render_status_bar(f: &mut Frame, area: Rect, view: &ViewState, config: &Config) {
    let (state_symbol, state_color, state_text) = if view.refreshing {
        ("◌", ACCENT_BLUE, "REFRESHING")
    } else if view.error.is_some() {
        ("●", ACCENT_PUT, "STALE")
    } else {
        ("●", ACCENT_CALL, "LIVE")
    };

    let family = if config.key.is_index { "INDEX" } else { "EQUITY" };
    let title = Span::styled(
        format!(" ◆ {} OPTION CHAIN ({}) ◆ ", config.key.symbol, family),
        Style::default().fg(ACCENT_GOLD).add_modifier(Modifier::BOLD),
    );

    let state = Span::styled(
        format!(" {} {} ", state_symbol, state_text),
        Style::default().fg(state_color).add_modifier(Modifier::BOLD),
    );

    let underlying = match view.frame.as_ref().and_then(|frame| frame.underlying) {
        Some(value) => Span::styled(
            format!(" Underlying {:.2} ", value),
            Style::default().fg(TEXT_MAIN),
        ),
        None => Span::styled(" Underlying - ", Style::default().fg(TEXT_DIM)),
    };

    let attempted = match view.last_attempt {
        Some(at) => Span::styled(
            format!(" ⏱ {} ", at.format("%H:%M:%S")),
            Style::default().fg(ACCENT_BLUE),
        ),
        None => Span::styled(" ⏱ -- ", Style::default().fg(TEXT_DIM)),
    };

    let help = Span::styled(" [R] Refresh  [Q] Quit ", Style::default().fg(TEXT_DIM));

    let status_line = Line::from(vec![state, title, underlying, attempted, help]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Rgb(138, 43, 226)))
        .style(Style::default().bg(Color::Rgb(18, 18, 28)));

    let paragraph = Paragraph::new(status_line)
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_metrics(f: &mut Frame, area: Rect, view: &ViewState) {
    let title = Line::from(vec![
        Span::styled(" ⚖ ", Style::default().fg(ACCENT_GOLD)),
        Span::styled(
            "SENTIMENT",
            Style::default()
                .fg(Color::Rgb(255, 255, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" (top-{DISPLAY_TOP_K} strike union) "),
            Style::default().fg(TEXT_DIM),
        ),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ACCENT_GOLD))
        .title_top(title.alignment(Alignment::Center))
        .style(Style::default().bg(PANEL_BG));

    let Some(frame) = view.frame.as_ref() else {
        let waiting = Paragraph::new(Text::from(vec![
            Line::from(""),
            Line::from(Span::styled(
                "⏳ Waiting for first snapshot...",
                Style::default().fg(TEXT_DIM).add_modifier(Modifier::ITALIC),
            )),
        ]))
        .block(block)
        .alignment(Alignment::Center);
        f.render_widget(waiting, area);
        return;
    };

    let pcr_line = match frame.pcr_display {
        Some(pcr) => {
            let color = match pcr.value {
                value if value > 1.0 => ACCENT_CALL,
                value if value < 1.0 => ACCENT_PUT,
                _ => TEXT_MAIN,
            };
            Line::from(vec![
                Span::styled(
                    format!("  PCR ({}) ", pcr.basis),
                    Style::default().fg(TEXT_MAIN),
                ),
                Span::styled(
                    format!("{:.2}  ", pcr.value),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(pcr.sentiment().as_str(), Style::default().fg(TEXT_DIM)),
            ])
        }
        None => Line::from(vec![
            Span::styled("  PCR ", Style::default().fg(TEXT_MAIN)),
            Span::styled("N/A  ", Style::default().fg(TEXT_DIM).add_modifier(Modifier::BOLD)),
            Span::styled(
                "could not be calculated (no open interest on the call side)",
                Style::default().fg(TEXT_DIM),
            ),
        ]),
    };

    let max_pain_line = match frame.max_pain {
        Some(mp) => Line::from(vec![
            Span::styled("  Max Pain ", Style::default().fg(TEXT_MAIN)),
            Span::styled(
                format!("{:.2}  ", mp.strike),
                Style::default().fg(ACCENT_GOLD).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("total pain {:.0}", mp.total_pain),
                Style::default().fg(TEXT_DIM),
            ),
        ]),
        None => Line::from(vec![
            Span::styled("  Max Pain ", Style::default().fg(TEXT_MAIN)),
            Span::styled("N/A  ", Style::default().fg(TEXT_DIM).add_modifier(Modifier::BOLD)),
            Span::styled(
                "no candidate strikes in the filtered set",
                Style::default().fg(TEXT_DIM),
            ),
        ]),
    };

    let persisted_line = match frame.pcr_top10 {
        Some(pcr) => Line::from(vec![
            Span::styled("  PCR top-10 (OI) ", Style::default().fg(TEXT_MAIN)),
            Span::styled(
                format!("{:.2}  ", pcr.value),
                Style::default().fg(ACCENT_BLUE).add_modifier(Modifier::BOLD),
            ),
            Span::styled("appended to history", Style::default().fg(TEXT_DIM)),
        ]),
        None => Line::from(vec![
            Span::styled("  PCR top-10 (OI) ", Style::default().fg(TEXT_MAIN)),
            Span::styled("N/A  ", Style::default().fg(TEXT_DIM).add_modifier(Modifier::BOLD)),
            Span::styled("nothing appended this cycle", Style::default().fg(TEXT_DIM)),
        ]),
    };

    let chain_time_line = match frame.chain_timestamp.as_deref() {
        Some(timestamp) => Line::from(Span::styled(
            format!("  Upstream snapshot: {timestamp}"),
            Style::default().fg(TEXT_DIM),
        )),
        None => Line::from(""),
    };

    let paragraph = Paragraph::new(vec![pcr_line, persisted_line, max_pain_line, chain_time_line])
        .block(block)
        .style(Style::default().bg(PANEL_BG));
    f.render_widget(paragraph, area);
}

fn render_side_table(
    f: &mut Frame,
    area: Rect,
    title_text: &str,
    accent: Color,
    records: &[StrikeRecord],
) {
    let title = Line::from(vec![Span::styled(
        format!(" {title_text} "),
        Style::default()
            .fg(Color::Rgb(255, 255, 255))
            .add_modifier(Modifier::BOLD),
    )]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(accent))
        .title_top(title.alignment(Alignment::Center))
        .style(Style::default().bg(PANEL_BG));

    if records.is_empty() {
        let waiting = Paragraph::new(Text::from(vec![
            Line::from(""),
            Line::from(Span::styled(
                "⏳ Waiting for data...",
                Style::default().fg(TEXT_DIM).add_modifier(Modifier::ITALIC),
            )),
        ]))
        .block(block)
        .alignment(Alignment::Center);
        f.render_widget(waiting, area);
        return;
    }

    let header = ListItem::new(Line::from(Span::styled(
        format!(
            " {:>9} {:>9} {:>10} {:>10} {:>11} {:>11} {:>7}",
            "Strike", "LTP", "Volume", "OI", "Buy Qty", "Sell Qty", "B/S"
        ),
        Style::default().fg(TEXT_DIM).add_modifier(Modifier::BOLD),
    )));

    let rows = records.iter().enumerate().map(|(idx, record)| {
        let bg_color = if idx % 2 == 0 {
            Color::Rgb(25, 25, 35)
        } else {
            Color::Rgb(20, 20, 30)
        };

        let ltp = record
            .last_traded_price
            .map(|value| format!("{value:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let ratio = record
            .buy_sell_ratio
            .map(|value| format!("{value:.2}"))
            .unwrap_or_else(|| "-".to_string());

        let line = Line::from(vec![
            Span::styled(
                format!(" {:>9.2}", record.strike),
                Style::default()
                    .fg(accent)
                    .bg(bg_color)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" {:>9}", ltp), Style::default().fg(ACCENT_GOLD).bg(bg_color)),
            Span::styled(
                format!(" {:>10}", record.volume),
                Style::default().fg(TEXT_MAIN).bg(bg_color),
            ),
            Span::styled(
                format!(" {:>10}", record.open_interest),
                Style::default().fg(TEXT_MAIN).bg(bg_color),
            ),
            Span::styled(
                format!(" {:>11}", record.total_buy_qty),
                Style::default().fg(TEXT_DIM).bg(bg_color),
            ),
            Span::styled(
                format!(" {:>11}", record.total_sell_qty),
                Style::default().fg(TEXT_DIM).bg(bg_color),
            ),
            Span::styled(
                format!(" {:>7}", ratio),
                Style::default().fg(Color::Rgb(255, 105, 180)).bg(bg_color),
            ),
        ]);

        ListItem::new(line).style(Style::default().bg(bg_color))
    });

    let items: Vec<ListItem> = std::iter::once(header).chain(rows).collect();
    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn render_pcr_trend(f: &mut Frame, area: Rect, view: &ViewState) {
    let series = view
        .frame
        .as_ref()
        .map(|frame| frame.pcr_series.as_slice())
        .unwrap_or(&[]);

    let title = Line::from(vec![
        Span::styled(" 📈 ", Style::default().fg(ACCENT_BLUE)),
        Span::styled(
            "PCR TOP-10 HISTORY",
            Style::default()
                .fg(Color::Rgb(255, 255, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" ({} samples) ", series.len()),
            Style::default().fg(TEXT_DIM),
        ),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ACCENT_BLUE))
        .title_top(title.alignment(Alignment::Center))
        .style(Style::default().bg(PANEL_BG));

    if series.is_empty() || area.height < 4 {
        let waiting = Paragraph::new(Text::from(vec![
            Line::from(""),
            Line::from(Span::styled(
                "⏳ No history yet...",
                Style::default().fg(TEXT_DIM).add_modifier(Modifier::ITALIC),
            )),
        ]))
        .block(block)
        .alignment(Alignment::Center);
        f.render_widget(waiting, area);
        return;
    }

    let inner = block.inner(area);
    f.render_widget(block, area);

    let latest = &series[series.len() - 1];
    let summary = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" latest {:.2} ", latest.value),
            Style::default().fg(ACCENT_BLUE).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("at {} ", latest.timestamp),
            Style::default().fg(TEXT_DIM),
        ),
    ]))
    .style(Style::default().bg(PANEL_BG));
    f.render_widget(
        summary,
        Rect {
            x: inner.x,
            y: inner.y,
            width: inner.width,
            height: 1,
        },
    );

    // Two decimal places of PCR per sparkline step
    let sparkline_data: Vec<u64> = series
        .iter()
        .map(|entry| (entry.value.max(0.0) * 100.0) as u64)
        .collect();

    let visible = sparkline_data
        .len()
        .saturating_sub(inner.width.saturating_sub(2) as usize);
    let sparkline = Sparkline::default()
        .data(&sparkline_data[visible..])
        .style(Style::default().fg(ACCENT_BLUE))
        .max(sparkline_data.iter().max().copied().unwrap_or(100).max(200));

    let sparkline_area = Rect {
        x: inner.x + 1,
        y: inner.y + 1,
        width: inner.width.saturating_sub(2),
        height: inner.height.saturating_sub(1),
    };
    f.render_widget(sparkline, sparkline_area);
}

fn render_messages(f: &mut Frame, area: Rect, view: &ViewState, config: &Config) {
    let (border_color, lines) = match view.error.as_ref() {
        Some(error) => (
            ACCENT_PUT,
            vec![
                Line::from(Span::styled(
                    format!(" ✖ {} ", error.label()),
                    Style::default().fg(ACCENT_PUT).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!(" {error} "),
                    Style::default().fg(TEXT_MAIN),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    " Showing the previous snapshot until the next cycle succeeds. ",
                    Style::default().fg(TEXT_DIM),
                )),
            ],
        ),
        None => (
            Color::Rgb(60, 60, 90),
            vec![
                Line::from(Span::styled(
                    format!(
                        " Snapshots cached for {}s, refreshed every {}s. ",
                        DEFAULT_TTL.as_secs(),
                        config.refresh.as_secs()
                    ),
                    Style::default().fg(TEXT_DIM),
                )),
                Line::from(Span::styled(
                    format!(" Metrics restricted to the top-{DISPLAY_TOP_K} strikes per side. "),
                    Style::default().fg(TEXT_DIM),
                )),
                Line::from(Span::styled(
                    format!(" History file: {} ", config.history_file),
                    Style::default().fg(TEXT_DIM),
                )),
            ],
        ),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color))
        .title_top(
            Line::from(Span::styled(
                " NOTES ",
                Style::default()
                    .fg(Color::Rgb(255, 255, 255))
                    .add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
        )
        .style(Style::default().bg(PANEL_BG));

    let paragraph = Paragraph::new(lines).block(block);
    f.render_widget(paragraph, area);
}
