mod help;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Terminal,
};
use std::{io, time::Duration, time::Instant};

use crate::location::LocationSource;
use crate::model::{format_distance, format_duration, Run, RunState, SessionSnapshot};
use crate::session::{self, SessionCommand, SessionHandle};
use crate::store::RunStore;

struct UiState {
    tab: usize,
    snapshot: SessionSnapshot,
    history: Vec<Run>,
    history_selected: usize,
    history_scroll_offset: usize,
    info: String,
    /// Armed delete: the id awaiting a 'y' confirmation.
    confirm_delete: Option<i64>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            snapshot: SessionSnapshot::default(),
            history: Vec::new(),
            history_selected: 0,
            history_scroll_offset: 0,
            info: String::new(),
            confirm_delete: None,
        }
    }
}

pub async fn run(store: RunStore, source: LocationSource) -> Result<()> {
    // The session task owns all transient state; the UI only sends intents
    // and reads snapshots.
    let handle = session::spawn(store, source);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the
    // Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(handle));

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    match join_res {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => Err(anyhow::anyhow!("join TUI thread: {e}")),
    }
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(mut handle: SessionHandle) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState {
        history: handle.history_rx.borrow().clone(),
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();

    let res = loop {
        // Pull the latest session and history snapshots without blocking.
        state.snapshot = *handle.snapshot_rx.borrow();
        if handle.history_rx.has_changed().unwrap_or(false) {
            state.history = handle.history_rx.borrow_and_update().clone();
            clamp_selection(&mut state);
        }
        while let Ok(msg) = handle.status_rx.try_recv() {
            state.info = msg;
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                // Any keypress other than 'y' disarms a pending delete.
                let armed = state.confirm_delete.take();
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = handle.cmd_tx.send(SessionCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char(' ')) => {
                        let _ = handle.cmd_tx.send(SessionCommand::Toggle);
                    }
                    (_, KeyCode::Char('f')) => {
                        let _ = handle.cmd_tx.send(SessionCommand::Finish);
                    }
                    (_, KeyCode::Char('x')) => {
                        let _ = handle.cmd_tx.send(SessionCommand::Reset);
                        state.info = "Session reset".into();
                    }
                    (_, KeyCode::Enter) | (_, KeyCode::Char('s')) => {
                        let _ = handle.cmd_tx.send(SessionCommand::Shuttle);
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 3;
                        if state.tab == 1 {
                            state.history_selected = 0;
                            state.history_scroll_offset = 0;
                        }
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 2;
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => {
                        if state.tab == 1 && state.history_selected > 0 {
                            state.history_selected -= 1;
                            if state.history_selected < state.history_scroll_offset {
                                state.history_scroll_offset = state.history_selected;
                            }
                        }
                    }
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => {
                        if state.tab == 1
                            && !state.history.is_empty()
                            && state.history_selected < state.history.len() - 1
                        {
                            state.history_selected += 1;
                        }
                    }
                    (_, KeyCode::Char('d')) => {
                        if state.tab == 1 && state.history_selected < state.history.len() {
                            let run = &state.history[state.history_selected];
                            state.confirm_delete = Some(run.id);
                            state.info = format!(
                                "Delete run #{} ({})? press y to confirm",
                                run.id, run.date
                            );
                        }
                    }
                    (_, KeyCode::Char('y')) => {
                        if let Some(id) = armed {
                            let _ = handle.cmd_tx.send(SessionCommand::DeleteRun(id));
                        }
                    }
                    _ => {
                        if armed.is_some() {
                            state.info = "Delete cancelled".into();
                        }
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Keep selection and scroll inside the (possibly shrunk) history.
fn clamp_selection(state: &mut UiState) {
    if state.history.is_empty() {
        state.history_selected = 0;
        state.history_scroll_offset = 0;
    } else if state.history_selected >= state.history.len() {
        state.history_selected = state.history.len() - 1;
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Session"),
        Line::from("History"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("shuttle-run"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_session(chunks[1], f, state),
        1 => draw_history(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn state_color(state: RunState) -> Color {
    match state {
        RunState::Stopped => Color::Gray,
        RunState::Running => Color::Green,
        RunState::Paused => Color::Yellow,
    }
}

fn draw_session(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(5), // Clock
                Constraint::Length(6), // Shuttles + distance
                Constraint::Min(0),    // Keys
                Constraint::Length(3), // Status
            ]
            .as_ref(),
        )
        .split(area);

    let snap = state.snapshot;
    let clock = Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::raw("   "),
            Span::styled(
                format_duration(snap.elapsed_ms),
                Style::default()
                    .fg(state_color(snap.state))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled(snap.state.label(), Style::default().fg(state_color(snap.state))),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Timer"));
    f.render_widget(clock, main[0]);

    let stats = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Shuttles: ", Style::default().fg(Color::Gray)),
            Span::styled(
                snap.shuttles.to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Distance: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format_distance(snap.distance_m),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(vec![
            Span::styled("Runs recorded: ", Style::default().fg(Color::Gray)),
            Span::raw(state.history.len().to_string()),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Session"));
    f.render_widget(stats, main[1]);

    let keys = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("space", Style::default().fg(Color::Magenta)),
            Span::raw("  start / pause / resume"),
        ]),
        Line::from(vec![
            Span::styled("enter", Style::default().fg(Color::Magenta)),
            Span::raw("  count a shuttle (while running)"),
        ]),
        Line::from(vec![
            Span::styled("f", Style::default().fg(Color::Magenta)),
            Span::raw("      finish and save"),
        ]),
        Line::from(vec![
            Span::styled("x", Style::default().fg(Color::Magenta)),
            Span::raw("      reset without saving"),
        ]),
        Line::from(vec![
            Span::styled("tab", Style::default().fg(Color::Magenta)),
            Span::raw("    history | "),
            Span::styled("?", Style::default().fg(Color::Magenta)),
            Span::raw(" help | "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" quit"),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(keys, main[2]);

    let status = Paragraph::new(Line::from(vec![
        Span::styled("Info: ", Style::default().fg(Color::Gray)),
        Span::raw(state.info.as_str()),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, main[3]);
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines: Vec<Line> = Vec::new();

    // Subtract header lines from the drawable height.
    let max_items = (area.height as usize).saturating_sub(4).max(1);
    let total = state.history.len();
    let pos = if total > 0 { state.history_selected + 1 } else { 0 };

    lines.push(Line::from(vec![
        Span::raw(format!("History ({pos}/{total}) - ")),
        Span::styled("j/k", Style::default().fg(Color::Magenta)),
        Span::raw(": navigate, "),
        Span::styled("d", Style::default().fg(Color::Magenta)),
        Span::raw(": delete (then "),
        Span::styled("y", Style::default().fg(Color::Magenta)),
        Span::raw(" to confirm)"),
    ]));
    if !state.info.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Info: ", Style::default().fg(Color::Gray)),
            Span::raw(state.info.as_str()),
        ]));
    }
    lines.push(Line::from(""));

    if total == 0 {
        lines.push(Line::from("No runs recorded yet. Finish a run to see it here."));
    }

    // Keep the selected item visible.
    let scroll_offset = {
        let mut offset = state.history_scroll_offset.min(total.saturating_sub(1));
        if state.history_selected < offset {
            offset = state.history_selected;
        } else if state.history_selected >= offset + max_items {
            offset = state.history_selected.saturating_sub(max_items - 1);
        }
        offset
    };

    for (display_idx, r) in state
        .history
        .iter()
        .skip(scroll_offset)
        .take(max_items)
        .enumerate()
    {
        let history_idx = scroll_offset + display_idx;
        let is_selected = history_idx == state.history_selected;
        let armed = state.confirm_delete == Some(r.id);

        let marker = if is_selected { "> " } else { "  " };
        let row = format!(
            "{marker}#{:<4} {:<10}  {}  {:>3} shuttles  {:>10}",
            r.id,
            r.date,
            r.duration,
            r.shuttles,
            format_distance(r.distance_in_meters)
        );
        let style = if armed {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else if is_selected {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(row, style)));
    }

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("History"));
    f.render_widget(p, area);
}
