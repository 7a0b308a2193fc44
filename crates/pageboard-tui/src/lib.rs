// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use pageboard_app::{
    ButtonView, CollectionSnapshot, CollectionView, DeleteEvent, EditorEvent, EditorTarget,
    EditorView, EntityStore, Listing, ListingView, RecordKey, RowView, ViewEvent,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::io;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(120);
const LOADING_TEXT: &str = "Loading pages…";
const EMPTY_TEXT: &str = "No pages found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Focus {
    #[default]
    Table,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct UiState {
    focus: Focus,
    selected: usize,
    status: Option<String>,
    help_visible: bool,
}

/// Takes over the terminal and drives `view` until the operator quits. The
/// terminal is restored on every exit path once raw mode is on.
pub fn run_app<S: EntityStore + ?Sized>(view: &mut CollectionView<S>) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    run_restoring(|| run_session(view), restore_terminal)
}

fn run_restoring<T>(
    session: impl FnOnce() -> Result<T>,
    restore: impl FnOnce() -> Result<()>,
) -> Result<T> {
    let result = session();
    let restored = restore();
    match result {
        Ok(value) => restored.map(|()| value),
        Err(error) => {
            if let Err(restore_error) = restored {
                tracing::warn!(error = %format!("{restore_error:#}"), "terminal restore failed");
            }
            Err(error)
        }
    }
}

fn restore_terminal() -> Result<()> {
    let raw = disable_raw_mode().context("disable raw mode");
    let screen =
        execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen");
    raw.and(screen)
}

fn run_session<S: EntityStore + ?Sized>(view: &mut CollectionView<S>) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).context("create terminal")?;

    let mut ui = UiState::default();
    loop {
        process_view_events(view, &mut ui);

        let snapshot = view.snapshot();
        terminal
            .draw(|frame| render(frame, &snapshot, &ui))
            .context("draw frame")?;

        if !event::poll(TICK).context("poll event")? {
            continue;
        }
        if let Event::Key(key) = event::read().context("read event")?
            && handle_key_event(view, &mut ui, key)
        {
            return Ok(());
        }
    }
}

fn process_view_events<S: EntityStore + ?Sized>(view: &mut CollectionView<S>, ui: &mut UiState) {
    for event in view.poll() {
        ui.status = Some(event_status(&event));
    }
    clamp_selection(ui, row_count(view.listing()));
}

fn event_status(event: &ViewEvent) -> String {
    match event {
        ViewEvent::Editor(EditorEvent::SaveFinished {
            target: EditorTarget::Create,
            key,
        }) => format!("page {key} created"),
        ViewEvent::Editor(EditorEvent::SaveFinished { key, .. }) => format!("page {key} saved"),
        ViewEvent::Editor(EditorEvent::SaveFailed { message, .. }) => match message {
            Some(message) => format!("save failed: {message}"),
            None => "save failed".to_owned(),
        },
        ViewEvent::Delete(DeleteEvent::Deleted { key }) => format!("page {key} deleted"),
        ViewEvent::Delete(DeleteEvent::DeleteFailed { key, message }) => match message {
            Some(message) => format!("delete of page {key} failed: {message}"),
            None => format!("delete of page {key} failed"),
        },
    }
}

fn row_count(listing: &Listing) -> usize {
    match listing {
        Listing::Rows(rows) => rows.len(),
        Listing::Loading | Listing::Empty => 0,
    }
}

fn clamp_selection(ui: &mut UiState, rows: usize) {
    ui.selected = ui.selected.min(rows.saturating_sub(1));
}

fn selected_key(listing: &Listing, ui: &UiState) -> Option<RecordKey> {
    match listing {
        Listing::Rows(rows) => rows.get(ui.selected).map(|row| row.key),
        Listing::Loading | Listing::Empty => None,
    }
}

/// Returns true when the operator asked to quit.
fn handle_key_event<S: EntityStore + ?Sized>(
    view: &mut CollectionView<S>,
    ui: &mut UiState,
    key: KeyEvent,
) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('q' | 'c')) {
        return true;
    }

    if let Some(target) = view.open_editor() {
        handle_editor_key(view, ui, target, key);
        return false;
    }

    if ui.help_visible {
        ui.help_visible = false;
        return false;
    }

    match ui.focus {
        Focus::Search => handle_search_key(view, ui, key),
        Focus::Table => return handle_table_key(view, ui, key),
    }
    false
}

fn handle_editor_key<S: EntityStore + ?Sized>(
    view: &mut CollectionView<S>,
    ui: &mut UiState,
    target: EditorTarget,
    key: KeyEvent,
) {
    let outcome = match key.code {
        KeyCode::Esc => view.cancel(target),
        KeyCode::Enter => view.save(target),
        KeyCode::Backspace => edit_title(view, target, |title| {
            title.pop();
        }),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            edit_title(view, target, |title| title.push(ch))
        }
        _ => Ok(()),
    };
    if let Err(error) = outcome {
        tracing::debug!(error = %format!("{error:#}"), "editor intent rejected");
        ui.status = Some(format!("{error:#}"));
    }
}

/// Typing is ignored while a save is running so the draft sent to the store
/// is the one the operator sees.
fn edit_title<S: EntityStore + ?Sized>(
    view: &mut CollectionView<S>,
    target: EditorTarget,
    change: impl FnOnce(&mut String),
) -> Result<()> {
    let Some(editor) = view.editor(target) else {
        return Ok(());
    };
    if editor.is_saving() {
        return Ok(());
    }
    let mut title = editor.title();
    change(&mut title);
    view.change_title(target, title)
}

fn handle_search_key<S: EntityStore + ?Sized>(
    view: &mut CollectionView<S>,
    ui: &mut UiState,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Down => ui.focus = Focus::Table,
        KeyCode::Backspace => {
            let mut term = view.search_term().to_owned();
            if term.pop().is_some() {
                view.search(term);
                ui.selected = 0;
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let mut term = view.search_term().to_owned();
            term.push(ch);
            view.search(term);
            ui.selected = 0;
        }
        _ => {}
    }
}

fn handle_table_key<S: EntityStore + ?Sized>(
    view: &mut CollectionView<S>,
    ui: &mut UiState,
    key: KeyEvent,
) -> bool {
    let rows = row_count(view.listing());
    let outcome = match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => {
            ui.help_visible = true;
            Ok(())
        }
        KeyCode::Char('/') => {
            ui.focus = Focus::Search;
            Ok(())
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if ui.selected + 1 < rows {
                ui.selected += 1;
            }
            Ok(())
        }
        KeyCode::Char('k') | KeyCode::Up => {
            ui.selected = ui.selected.saturating_sub(1);
            Ok(())
        }
        KeyCode::Char('g') | KeyCode::Home => {
            ui.selected = 0;
            Ok(())
        }
        KeyCode::Char('G') | KeyCode::End => {
            ui.selected = rows.saturating_sub(1);
            Ok(())
        }
        KeyCode::Char('n') => view.open(EditorTarget::Create),
        KeyCode::Char('e') | KeyCode::Enter => match selected_key(view.listing(), ui) {
            Some(key) => view.open(EditorTarget::Existing(key)),
            None => Ok(()),
        },
        KeyCode::Char('d') => match selected_key(view.listing(), ui) {
            Some(key) => view.delete(key),
            None => Ok(()),
        },
        _ => Ok(()),
    };
    if let Err(error) = outcome {
        tracing::debug!(error = %format!("{error:#}"), "table intent rejected");
        ui.status = Some(format!("{error:#}"));
    }
    false
}

fn render(frame: &mut ratatui::Frame<'_>, snapshot: &CollectionSnapshot, ui: &UiState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let search_style = if ui.focus == Focus::Search {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let search = Paragraph::new(search_text(snapshot, ui)).block(
        Block::default()
            .title("pageboard")
            .borders(Borders::ALL)
            .style(search_style),
    );
    frame.render_widget(search, layout[0]);

    render_listing(frame, layout[1], snapshot, ui);

    let status = Paragraph::new(status_text(snapshot, ui))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(editor) = snapshot.editors.first() {
        let area = centered_rect(60, 30, frame.area());
        frame.render_widget(Clear, area);
        let border = if editor.error.is_some() {
            Color::Red
        } else {
            Color::Cyan
        };
        let modal = Paragraph::new(editor_modal_text(editor)).block(
            Block::default()
                .title(editor.heading)
                .borders(Borders::ALL)
                .style(Style::default().fg(border)),
        );
        frame.render_widget(modal, area);
    }

    if ui.help_visible {
        let area = centered_rect(60, 40, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn search_text(snapshot: &CollectionSnapshot, ui: &UiState) -> String {
    let cursor = if ui.focus == Focus::Search { "_" } else { "" };
    format!(
        "Search pages: {}{cursor}    {}",
        snapshot.search,
        button_text(snapshot.create)
    )
}

fn render_listing(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    snapshot: &CollectionSnapshot,
    ui: &UiState,
) {
    let rows = match &snapshot.listing {
        ListingView::Loading => {
            let loading = Paragraph::new(LOADING_TEXT)
                .block(Block::default().title("pages").borders(Borders::ALL));
            frame.render_widget(loading, area);
            return;
        }
        ListingView::Empty => {
            let empty = Paragraph::new(EMPTY_TEXT)
                .block(Block::default().title("pages").borders(Borders::ALL));
            frame.render_widget(empty, area);
            return;
        }
        ListingView::Rows(rows) => rows,
    };

    let header = Row::new(["Title", "Actions"].map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let body = rows.iter().enumerate().map(|(index, row)| {
        let mut style = Style::default();
        if row.delete.button.busy {
            style = style.fg(Color::DarkGray);
        }
        if row.delete.error.is_some() {
            style = style.fg(Color::Red);
        }
        if index == ui.selected && ui.focus == Focus::Table {
            style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
        }
        Row::new([
            Cell::from(row.title.clone()),
            Cell::from(row_actions_text(row)),
        ])
        .style(style)
    });

    let table = Table::new(body, [Constraint::Percentage(60), Constraint::Percentage(40)])
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(format!("pages ({})", rows.len()))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn button_text(button: ButtonView) -> String {
    if button.disabled {
        format!("({})", button.label)
    } else {
        format!("[{}]", button.label)
    }
}

fn row_actions_text(row: &RowView) -> String {
    let mut text = format!(
        "{} {}",
        button_text(row.edit),
        button_text(row.delete.button)
    );
    if let Some(error) = &row.delete.error {
        text.push_str("  ");
        text.push_str(error);
    }
    text
}

fn editor_modal_text(editor: &EditorView) -> String {
    let mut lines = vec![
        format!("{}:", editor.field_label),
        format!("> {}", editor.title),
        String::new(),
    ];
    if let Some(error) = &editor.error {
        lines.push(error.clone());
        lines.push(String::new());
    }
    lines.push(format!(
        "{} enter   {} esc",
        button_text(editor.save),
        button_text(editor.cancel)
    ));
    lines.join("\n")
}

fn status_text(snapshot: &CollectionSnapshot, ui: &UiState) -> String {
    let hints = if !snapshot.editors.is_empty() {
        "type title | enter save | esc cancel | ctrl+q quit"
    } else if ui.focus == Focus::Search {
        "type to search | enter/esc done | ctrl+q quit"
    } else {
        "j/k move | / search | n new | e edit | d delete | ? help | q quit"
    };
    match &ui.status {
        Some(status) => format!("{status} | {hints}"),
        None => hints.to_owned(),
    }
}

fn help_overlay_text() -> &'static str {
    "table: j/k or up/down move | g/G first/last | enter or e edit | d delete | n new page\n\
search: / focus | type to filter | backspace erase | enter/esc back to table\n\
editor: type title | backspace erase | enter save | esc cancel\n\
global: q or ctrl+q quit | ? help (any key closes)"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
