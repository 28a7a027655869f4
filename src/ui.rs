//! Terminal front end.
//!
//! Redraws the dashboard whenever the poller publishes a new state or the
//! terminal sends an event. `q`, `Esc` and `Ctrl-C` quit; `r` retries while
//! the connection error panel is shown.

use std::io;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures_util::StreamExt;
use ratatui::DefaultTerminal;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row as TableRow, Table};
use ratatui::Frame;
use tracing::{debug, info};

use crate::download_client::DownloadSource;
use crate::poller::Poller;
use crate::view::{self, BadgeStyle, Body, DashboardView, Header, Row};

const COLUMNS: [&str; 6] = ["ID", "Filename", "Hash", "Remote Path", "Status", "Timestamp"];

/// Raw mode + alternate screen for as long as this value lives.
pub struct TerminalGuard {
    terminal: DefaultTerminal,
}

impl TerminalGuard {
    /// Takes over the terminal through `ratatui::try_init`.</br>
    /// If any step of the setup fails the terminal is restored before the error is returned.
    pub fn enter() -> io::Result<Self> {
        let terminal = restore_on_error(
            || {
                let mut terminal = ratatui::try_init()?;
                terminal.clear()?;
                return Ok(terminal);
            },
            || {
                let _ = ratatui::try_restore();
            },
        )?;
        return Ok(Self { terminal });
    }

    pub fn terminal_mut(&mut self) -> &mut DefaultTerminal {
        return &mut self.terminal;
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        ratatui::restore();
    }
}

/// Runs `setup`, calling `restore` before handing back any error it returns.
fn restore_on_error<T>(
    setup: impl FnOnce() -> io::Result<T>,
    restore: impl FnOnce(),
) -> io::Result<T> {
    let result = setup();
    if result.is_err() {
        restore();
    }
    return result;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Retry,
    Ignore,
}

/// Maps a key press to what the dashboard should do with `view` on screen.
pub fn on_key(key: KeyEvent, view: &DashboardView) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::Ignore;
    }
    return match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('r') | KeyCode::Char('R') if view.is_error() => KeyAction::Retry,
        _ => KeyAction::Ignore,
    };
}

/// Runs until the user quits or the terminal event stream ends.
pub async fn run<S: DownloadSource>(
    terminal: &mut DefaultTerminal,
    poller: &Poller<S>,
) -> io::Result<()> {
    let mut updates = poller.subscribe();
    let mut events = EventStream::new();

    loop {
        let dashboard = {
            let state = updates.borrow_and_update();
            view::render(&state)
        };
        terminal.draw(|frame| draw(frame, &dashboard))?;

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    debug!("poller state closed");
                    break;
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => match on_key(key, &dashboard) {
                        KeyAction::Quit => {
                            info!("quit requested");
                            break;
                        }
                        KeyAction::Retry => {
                            poller.retry();
                        }
                        KeyAction::Ignore => {}
                    },
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                    None => break,
                }
            }
        }
    }

    return Ok(());
}

/// Draws one frame of `dashboard`.
pub fn draw(frame: &mut Frame<'_>, dashboard: &DashboardView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(5), Constraint::Length(1)])
        .split(frame.area());

    draw_header(frame, chunks[0], &dashboard.header);
    match &dashboard.body {
        Body::Error { title, message, retry_label } => {
            draw_error(frame, chunks[1], title, message, retry_label);
        }
        Body::Loading(message) | Body::Empty(message) => draw_placeholder(frame, chunks[1], message),
        Body::Table(rows) => draw_table(frame, chunks[1], rows),
    }
    draw_footer(frame, chunks[2], dashboard.is_error());
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, header: &Header) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let title = Paragraph::new(vec![
        Line::from(Span::styled(
            header.title,
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(header.subtitle, Style::default().fg(Color::DarkGray))),
    ])
    .block(Block::default().borders(Borders::TOP | Borders::LEFT | Borders::BOTTOM));

    let status = Paragraph::new(vec![
        Line::from(Span::styled(header.last_updated.as_str(), Style::default().fg(Color::DarkGray))),
        Line::from(vec![
            Span::styled("\u{25CF} ", Style::default().fg(Color::Green)),
            Span::raw(header.online_label),
            Span::raw("   "),
            Span::raw(header.files_processed()),
        ]),
    ])
    .alignment(Alignment::Right)
    .block(Block::default().borders(Borders::TOP | Borders::RIGHT | Borders::BOTTOM));

    frame.render_widget(title, halves[0]);
    frame.render_widget(status, halves[1]);
}

fn draw_error(frame: &mut Frame<'_>, area: Rect, title: &str, message: &str, retry_label: &str) {
    let red = Style::default().fg(Color::Red);
    let panel = Paragraph::new(vec![
        Line::from(Span::styled("\u{2716}", red)),
        Line::from(Span::styled(title, red.add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(message, red)),
        Line::default(),
        Line::from(Span::styled(
            format!("[r] {retry_label}"),
            Style::default().fg(Color::White).bg(Color::Red),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).border_style(red));

    frame.render_widget(panel, area);
}

fn draw_placeholder(frame: &mut Frame<'_>, area: Rect, message: &str) {
    let placeholder = Paragraph::new(vec![
        Line::from(COLUMNS.join("  \u{2502}  ")).style(Style::default().fg(Color::Gray)),
        Line::default(),
        Line::default(),
        Line::from(Span::styled(message, Style::default().fg(Color::DarkGray))),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));

    frame.render_widget(placeholder, area);
}

fn draw_table(frame: &mut Frame<'_>, area: Rect, rows: &[Row]) {
    let rows = rows.iter().map(|row| {
        TableRow::new([
            Cell::from(Span::styled(row.id.clone(), Style::default().fg(Color::DarkGray))),
            Cell::from(Line::from(vec![
                Span::styled(format!("{} ", row.icon), Style::default().fg(Color::Blue)),
                Span::styled(row.filename.clone(), Style::default().add_modifier(Modifier::BOLD)),
            ])),
            Cell::from(Span::styled(row.hash.clone(), Style::default().fg(Color::DarkGray))),
            Cell::from(row.remote_location.clone()),
            Cell::from(Span::styled(format!(" {} ", row.status), badge(row.badge))),
            Cell::from(Span::styled(row.timestamp.clone(), Style::default().fg(Color::DarkGray))),
        ])
    });

    let widths = [
        Constraint::Length(6),
        Constraint::Percentage(20),
        Constraint::Length(12),
        Constraint::Percentage(25),
        Constraint::Length(11),
        Constraint::Length(19),
    ];

    let table = Table::new(rows, widths)
        .header(column_header())
        .column_spacing(1)
        .block(Block::default().borders(Borders::ALL));

    frame.render_widget(table, area);
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, is_error: bool) {
    let hint = if is_error { "r retry  \u{00B7}  q quit" } else { "q quit" };
    frame.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray))),
        area,
    );
}

fn column_header() -> TableRow<'static> {
    return TableRow::new(COLUMNS.map(|name| {
        Cell::from(Span::styled(name, Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)))
    }))
    .bottom_margin(1);
}

/// Badge colors for each status style.
pub fn badge(style: BadgeStyle) -> Style {
    let color = match style {
        BadgeStyle::Green => Color::Green,
        BadgeStyle::Red => Color::Red,
        BadgeStyle::Yellow => Color::Yellow,
        BadgeStyle::Gray => Color::Gray,
    };
    return Style::default().fg(Color::Black).bg(color);
}
