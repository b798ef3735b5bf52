use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::models::{ApplicationRecord, ApplicationRow, StatusFilter, UiStatus};
use crate::viewer::StatusViewer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Search,
}

struct AppState {
    filter: StatusFilter,
    query: String,
    mode: Mode,
    rows: Vec<ApplicationRow>,
    selected: usize,
    scroll_offset: u16,
    refreshing: bool,
}

impl AppState {
    fn new() -> Self {
        Self {
            filter: StatusFilter::All,
            query: String::new(),
            mode: Mode::Browse,
            rows: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            refreshing: false,
        }
    }

    // Rows are always derived from the viewer's full list
    fn recompute(&mut self, viewer: &StatusViewer) {
        self.rows = viewer.rows(self.filter, &self.query);
        if self.selected >= self.rows.len() {
            self.selected = self.rows.len().saturating_sub(1);
        }
        self.scroll_offset = 0;
    }

    fn current_row(&self) -> Option<&ApplicationRow> {
        self.rows.get(self.selected)
    }

    fn next(&mut self) {
        if !self.rows.is_empty() && self.selected < self.rows.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run_dashboard(
    viewer: &mut StatusViewer,
    token: Option<&str>,
    cancel: &CancellationToken,
    handle: &Handle,
) -> Result<()> {
    let mut state = AppState::new();
    state.recompute(viewer);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, viewer, token, cancel, handle);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Continue,
    Quit,
    Interrupt,
    Refresh,
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn handle_key(state: &mut AppState, viewer: &StatusViewer, key: KeyEvent) -> Action {
    // Raw mode turns Ctrl-C into a key press instead of SIGINT
    if is_interrupt(&key) {
        return Action::Interrupt;
    }

    if state.mode == Mode::Search {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => state.mode = Mode::Browse,
            KeyCode::Backspace => {
                state.query.pop();
                state.recompute(viewer);
            }
            KeyCode::Char(c) => {
                state.query.push(c);
                state.recompute(viewer);
            }
            _ => {}
        }
        return Action::Continue;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
        KeyCode::Down | KeyCode::Char('j') => state.next(),
        KeyCode::Up | KeyCode::Char('k') => state.prev(),
        KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
        KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
        KeyCode::Tab | KeyCode::Char('f') => {
            state.filter = state.filter.cycle();
            state.recompute(viewer);
        }
        KeyCode::Char('/') => state.mode = Mode::Search,
        KeyCode::Char('c') => {
            state.query.clear();
            state.filter = StatusFilter::All;
            state.recompute(viewer);
        }
        KeyCode::Char('r') => return Action::Refresh,
        _ => {}
    }
    Action::Continue
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    viewer: &mut StatusViewer,
    token: Option<&str>,
    cancel: &CancellationToken,
    handle: &Handle,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        if cancel.is_cancelled() {
            break;
        }
        terminal.draw(|frame| draw(frame, state, viewer, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match handle_key(state, viewer, key) {
                Action::Continue => {}
                Action::Quit => break,
                Action::Interrupt => {
                    cancel.cancel();
                    break;
                }
                Action::Refresh => {
                    state.refreshing = true;
                    terminal.draw(|frame| draw(frame, state, viewer, &mut list_state))?;
                    refresh_interruptibly(viewer, token, cancel, handle)?;
                    state.refreshing = false;
                    state.recompute(viewer);
                }
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

// Runs the fetch while a blocking task watches the keyboard, so Ctrl-C or Esc
// abandons a slow refresh. Other keys pressed meanwhile are dropped.
fn refresh_interruptibly(
    viewer: &mut StatusViewer,
    token: Option<&str>,
    cancel: &CancellationToken,
    handle: &Handle,
) -> Result<()> {
    let refresh_cancel = cancel.child_token();
    let watcher_cancel = refresh_cancel.clone();

    let watched = handle.block_on(async {
        let watcher = tokio::task::spawn_blocking(move || watch_for_interrupt(&watcher_cancel));
        // Failures are kept on the viewer and shown in the header
        let _ = viewer.refresh(token, &refresh_cancel).await;
        refresh_cancel.cancel();
        watcher.await
    });

    watched.context("Keyboard watcher stopped unexpectedly")?
}

fn watch_for_interrupt(refresh_cancel: &CancellationToken) -> Result<()> {
    while !refresh_cancel.is_cancelled() {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && (is_interrupt(&key) || key.code == KeyCode::Esc) {
                tracing::debug!("refresh cancelled from keyboard");
                refresh_cancel.cancel();
            }
        }
    }
    Ok(())
}

fn status_style(status: UiStatus) -> Style {
    match status {
        UiStatus::Applied => Style::default().fg(Color::Cyan),
        UiStatus::Interview => Style::default().fg(Color::Yellow),
        UiStatus::Offer => Style::default().fg(Color::Green),
        UiStatus::Rejected => Style::default().fg(Color::Red),
    }
}

fn draw(frame: &mut Frame, state: &AppState, viewer: &StatusViewer, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(build_header(state, viewer), rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(60),
        ])
        .split(rows[1]);

    // Left panel: application list
    let items: Vec<ListItem> = state
        .rows
        .iter()
        .map(|row| {
            let icon = match row.status {
                UiStatus::Applied => "+",
                UiStatus::Interview => "*",
                UiStatus::Offer => "$",
                UiStatus::Rejected => "x",
            };
            let title = if row.title.chars().count() > 30 {
                format!("{}...", row.title.chars().take(27).collect::<String>())
            } else {
                row.title.clone()
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", icon), status_style(row.status)),
                Span::raw(format!("{} | {}", title, row.company)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Applications ({}/{}) ",
            state.rows.len(),
            viewer.applications().len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: application detail
    let record = state
        .current_row()
        .and_then(|row| viewer.applications().iter().find(|r| r.id == row.id));
    let detail = build_detail(state.current_row(), record);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    let help_text = match state.mode {
        _ if state.refreshing => " refreshing...  ctrl-c/esc:cancel",
        Mode::Browse => " j/k:navigate  J/K:scroll  tab:filter  /:search  c:clear  r:refresh  q/ctrl-c:quit",
        Mode::Search => " type to search  backspace:delete  enter/esc:done",
    };
    let help = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[2]);
}

fn build_header<'a>(state: &'a AppState, viewer: &'a StatusViewer) -> Paragraph<'a> {
    let mut tabs: Vec<Span> = vec![Span::raw(" ")];
    for filter in StatusFilter::ORDER {
        let label = format!(" {} ", filter.as_str());
        if filter == state.filter {
            tabs.push(Span::styled(label, Style::default().bg(Color::Blue).add_modifier(Modifier::BOLD)));
        } else {
            tabs.push(Span::raw(label));
        }
    }

    let cursor = if state.mode == Mode::Search { "_" } else { "" };
    tabs.push(Span::raw(format!("   search: {}{}", state.query, cursor)));

    let notice = if viewer.is_sample() {
        let reason = viewer
            .last_error()
            .map(|e| e.to_string())
            .unwrap_or_default();
        Line::from(Span::styled(
            format!(" Showing sample data, could not load your applications: {}", reason),
            Style::default().fg(Color::Red),
        ))
    } else if let Some(e) = viewer.last_error() {
        Line::from(Span::styled(format!(" {}", e), Style::default().fg(Color::Red)))
    } else {
        Line::from("")
    };

    Paragraph::new(Text::from(vec![Line::from(tabs), notice]))
        .block(Block::default().borders(Borders::BOTTOM).title(" Dashboard "))
}

fn build_detail<'a>(row: Option<&'a ApplicationRow>, record: Option<&'a ApplicationRecord>) -> Text<'a> {
    let Some(row) = row else {
        return Text::raw("No applications match");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &row.title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", row.company)));
    lines.push(Line::from(row.location.as_str()));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", row.status),
        status_style(row.status),
    )));
    if !row.date.is_empty() {
        lines.push(Line::from(format!("Applied: {}", row.date)));
    }
    lines.push(Line::from(Span::styled(
        format!("Application #{}", row.id),
        Style::default().fg(Color::DarkGray),
    )));

    let Some(record) = record else {
        return Text::from(lines);
    };

    if let Some(job_type) = record.job.as_ref().and_then(|j| j.job_type.as_deref()) {
        lines.push(Line::from(format!("Type: {}", job_type)));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Submitted",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("  {} <{}>", record.full_name, record.email)));
    lines.push(Line::from(format!("  Phone: {}", record.phone)));
    lines.push(Line::from(format!("  Resume: {}", record.resume)));

    match record.cover_letter.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(letter) => {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Cover Letter",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for line in textwrap::fill(letter, 70).lines() {
                lines.push(Line::from(format!("  {}", line)));
            }
        }
        None => {
            lines.push(Line::from(Span::styled(
                "  (No cover letter)",
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    Text::from(lines)
}
