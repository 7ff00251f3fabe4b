mod tui_app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

use hero_market::config::PAGE_SIZE;
use hero_market::feed::FeedPhase;
use hero_market::types::{Rarity, TraitKey};
use tui_app::{format_rarity, format_stamina, format_xp, truncate, AppState, ConnectionStatus, View};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let page_size = std::env::var("PAGE_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(PAGE_SIZE);
    let viewer = std::env::var("VIEWER_ADDRESS").ok().filter(|s| !s.trim().is_empty());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url, page_size, viewer);

    // Initial fetch before rendering
    app.load_more(&client).await;
    app.refresh_health(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();
    table_state.select(None);

    let result = run_loop(&mut terminal, &mut app, &client, &mut table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    table_state: &mut TableState,
) -> io::Result<()> {
    let health_interval = Duration::from_secs(10);
    let mut last_health = std::time::Instant::now();

    loop {
        if app.wants_more(table_state.selected()) {
            app.load_more(client).await;
        }

        terminal.draw(|f| render(f, app, table_state))?;

        let timeout = health_interval
            .checked_sub(last_health.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let mut restarted = true;
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('s') => app.cycle_sort(),
                        KeyCode::Char('h') => app.toggle_hide_questing(),
                        KeyCode::Char('l') => app.toggle_hide_listed(),
                        KeyCode::Char('o') => app.toggle_view(),
                        KeyCode::Char('r') | KeyCode::Char('R') => app.reload(),
                        KeyCode::Down | KeyCode::Char('j') => {
                            restarted = false;
                            let max = app.feed.items().len().saturating_sub(1);
                            let next = table_state.selected().map_or(0, |i| (i + 1).min(max));
                            table_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            restarted = false;
                            let prev = table_state
                                .selected()
                                .map_or(0, |i| i.saturating_sub(1));
                            table_state.select(Some(prev));
                        }
                        _ => restarted = false,
                    }
                    if restarted {
                        table_state.select(None);
                    }
                }
            }
        }

        if last_health.elapsed() >= health_interval {
            app.refresh_health(client).await;
            last_health = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_heroes_table(f, app, table_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let view = match &app.view {
        View::Market => "market".to_string(),
        View::Owned(owner) => format!("owned by {}", truncate(owner, 12)),
    };
    let mut flags = Vec::new();
    if app.hide_questing {
        flags.push("no questing");
    }
    if app.hide_listed {
        flags.push("no listed");
    }
    let flags = if flags.is_empty() { "all".to_string() } else { flags.join(", ") };

    let (indexer_text, indexer_color) = match (app.health.indexer_ok, app.health.refresh_failures) {
        (Some(true), _) => (format!("indexer ok ({} listed)", app.health.listings.unwrap_or(0)), Color::Green),
        (Some(false), Some(n)) => (format!("indexer failing ({n}x)"), Color::Red),
        _ => ("indexer —".to_string(), Color::DarkGray),
    };

    let title_spans = vec![
        Span::styled(
            " Hero Market  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(indexer_text, Style::default().fg(indexer_color)),
        Span::raw("  │  "),
        Span::styled(view, Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(format!("sort: {}", app.sort()), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(format!("show: {flags}"), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(
            format!(
                "{} shown / {} matched / {} fetched",
                app.feed.items().len(),
                app.matched,
                app.fetched
            ),
            Style::default().fg(Color::White),
        ),
    ];

    let header_line = Line::from(title_spans);
    let paragraph = Paragraph::new(header_line)
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_heroes_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["#", "Id", "Class", "Sub", "Profession", "Rarity", "Gen", "Lvl", "Next", "Stam", "Price"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .feed
        .items()
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let rarity = h.rarity();
            let price_color = if h.is_for_sale { Color::Green } else { Color::DarkGray };
            let price = if h.is_for_sale { h.price_display.clone() } else { "—".to_string() };
            let id_style = if h.is_on_quest {
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(format!("{}", i + 1)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&h.id, 14)).style(id_style),
                Cell::from(h.text(TraitKey::Class)),
                Cell::from(h.text(TraitKey::SubClass)),
                Cell::from(h.text(TraitKey::Profession)),
                Cell::from(format_rarity(rarity)).style(Style::default().fg(rarity_color(rarity))),
                Cell::from(h.int(TraitKey::Generation).to_string()),
                Cell::from(h.int(TraitKey::Level).to_string()).style(Style::default().fg(Color::Cyan)),
                Cell::from(format_xp(h.xp_to_next_level)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(format_stamina(h.current_stamina, h.stamina)),
                Cell::from(price).style(Style::default().fg(price_color)),
            ])
        })
        .collect();

    let mut title = " HEROES ".to_string();
    if app.feed.items().is_empty() && !app.empty_message().is_empty() {
        title = format!(" HEROES: {} ", app.empty_message());
    } else if app.feed.phase() == FeedPhase::Exhausted {
        title = " HEROES (end) ".to_string();
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(11),
            Constraint::Length(10),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                title,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[s] ", Style::default().fg(Color::Yellow)),
        Span::raw("sort  "),
        Span::styled("[h] ", Style::default().fg(Color::Yellow)),
        Span::raw("questing  "),
        Span::styled("[l] ", Style::default().fg(Color::Yellow)),
        Span::raw("listed  "),
        Span::styled("[o] ", Style::default().fg(Color::Yellow)),
        Span::raw("market/owned  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("reload  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll"),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rarity_color(rarity: Option<Rarity>) -> Color {
    match rarity {
        Some(Rarity::Common) => Color::White,
        Some(Rarity::Uncommon) => Color::Green,
        Some(Rarity::Rare) => Color::Blue,
        Some(Rarity::Legendary) => Color::Yellow,
        Some(Rarity::Mythic) => Color::Magenta,
        None => Color::DarkGray,
    }
}
