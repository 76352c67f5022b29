// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use fieldguide_app::{
    AppCommand, AppMode, AppState, FormKind, Species, SpeciesField, SpeciesFields,
    SpeciesFormInput, SpeciesId, UserId, filter_species, format_population,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const CURSOR_MARK: &str = "›";

/// Seam between the terminal loop and the hosted service. The runtime owns
/// the session; the form layer never sees tokens or author ids.
pub trait AppRuntime {
    fn current_user(&self) -> &UserId;
    fn load_species(&mut self) -> Result<Vec<Species>>;
    fn create_species(&mut self, fields: &SpeciesFields) -> Result<Species>;
    fn update_species(&mut self, id: SpeciesId, fields: &SpeciesFields) -> Result<Species>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormUiState {
    input: SpeciesFormInput,
    field_cursor: usize,
    editing: Option<SpeciesId>,
}

impl FormUiState {
    fn active_field(&self) -> SpeciesField {
        SpeciesField::ALL[self.field_cursor % SpeciesField::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    species: Vec<Species>,
    cursor: usize,
    form: Option<FormUiState>,
    help_visible: bool,
    status_token: u64,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_species(state, runtime, &mut view_data) {
        state.dispatch(AppCommand::SetStatus(format!("load failed: {error}")));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data, runtime)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(state: &mut AppState, view_data: &ViewData, rx: &Receiver<InternalEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        view_data.help_visible = false;
        return false;
    }

    match state.mode {
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key),
        AppMode::Search => {
            handle_search_key(state, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::Detail => {
            handle_detail_key(state, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::Form(kind) => {
            handle_form_key(state, runtime, view_data, internal_tx, key, kind);
            false
        }
    }
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('/') => {
            state.dispatch(AppCommand::OpenSearch);
        }
        KeyCode::Char('n') => {
            view_data.form = Some(FormUiState {
                input: SpeciesFormInput::blank(),
                field_cursor: 0,
                editing: None,
            });
            state.dispatch(AppCommand::OpenForm(FormKind::Create));
        }
        KeyCode::Char('e') => {
            open_edit_form(state, runtime, view_data, internal_tx);
        }
        KeyCode::Enter => {
            if selected_species(view_data, state).is_some() {
                state.dispatch(AppCommand::OpenDetail);
            }
        }
        KeyCode::Char('j') | KeyCode::Down => move_cursor(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_cursor(state, view_data, -1),
        KeyCode::Char('g') => view_data.cursor = 0,
        KeyCode::Char('G') => {
            let len = filtered_rows(view_data, state).len();
            view_data.cursor = len.saturating_sub(1);
        }
        KeyCode::Char('r') => {
            match refresh_species(state, runtime, view_data) {
                Ok(()) => {
                    let count = view_data.species.len();
                    emit_status(state, view_data, internal_tx, format!("loaded {count} species"));
                }
                Err(error) => {
                    emit_status(state, view_data, internal_tx, format!("refresh failed: {error}"));
                }
            }
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        _ => {}
    }
    false
}

fn handle_search_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        // Enter keeps the filter applied; Esc drops it.
        KeyCode::Enter => {
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Esc => {
            state.dispatch(AppCommand::SetQuery(String::new()));
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Backspace => {
            let mut query = state.query.clone();
            query.pop();
            apply_query_change(state, runtime, view_data, internal_tx, query);
        }
        KeyCode::Char(ch) => {
            let mut query = state.query.clone();
            query.push(ch);
            apply_query_change(state, runtime, view_data, internal_tx, query);
        }
        _ => {}
    }
}

/// Every keystroke refetches the full list before the client-side filter is
/// applied. Wasteful, but it keeps results fresh while typing; a debounce can
/// land here without touching the filter.
fn apply_query_change<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    query: String,
) {
    state.dispatch(AppCommand::SetQuery(query));
    if let Err(error) = refresh_species(state, runtime, view_data) {
        emit_status(state, view_data, internal_tx, format!("refresh failed: {error}"));
    }
}

fn handle_detail_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Char('e') => {
            open_edit_form(state, runtime, view_data, internal_tx);
        }
        KeyCode::Char('j') | KeyCode::Down => move_cursor(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_cursor(state, view_data, -1),
        _ => {}
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    kind: FormKind,
) {
    let Some(form) = view_data.form.as_mut() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };

    match key.code {
        KeyCode::Esc => {
            view_data.form = None;
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Tab | KeyCode::Down => {
            form.field_cursor = (form.field_cursor + 1) % SpeciesField::ALL.len();
        }
        KeyCode::BackTab | KeyCode::Up => {
            form.field_cursor =
                (form.field_cursor + SpeciesField::ALL.len() - 1) % SpeciesField::ALL.len();
        }
        KeyCode::Left if form.active_field() == SpeciesField::Kingdom => {
            form.input.cycle_kingdom(-1);
        }
        KeyCode::Right if form.active_field() == SpeciesField::Kingdom => {
            form.input.cycle_kingdom(1);
        }
        KeyCode::Backspace => {
            let field = form.active_field();
            if let Some(text) = form.input.field_text_mut(field) {
                text.pop();
            }
        }
        KeyCode::Char(ch) => {
            let field = form.active_field();
            if let Some(text) = form.input.field_text_mut(field) {
                text.push(ch);
            }
        }
        KeyCode::Enter => {
            submit_form(state, runtime, view_data, internal_tx, kind);
        }
        _ => {}
    }
}

fn open_edit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(species) = selected_species(view_data, state) else {
        return;
    };
    if !species.editable_by(runtime.current_user()) {
        emit_status(
            state,
            view_data,
            internal_tx,
            "only the author can edit this record",
        );
        return;
    }

    view_data.form = Some(FormUiState {
        input: SpeciesFormInput::from_species(&species),
        field_cursor: 0,
        editing: Some(species.id),
    });
    state.dispatch(AppCommand::OpenForm(FormKind::Edit));
}

/// Validation failure or a rejected request both leave the form open with the
/// typed input intact; only a successful save closes it.
fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: FormKind,
) {
    let Some(form) = view_data.form.clone() else {
        return;
    };

    let fields = match form.input.normalized() {
        Ok(fields) => fields,
        Err(error) => {
            emit_status(state, view_data, internal_tx, error.to_string());
            return;
        }
    };

    let saved = match (kind, form.editing) {
        (FormKind::Edit, Some(id)) => runtime.update_species(id, &fields).map(|_| "species updated"),
        _ => runtime.create_species(&fields).map(|_| "species created"),
    };

    match saved {
        Ok(done) => {
            view_data.form = None;
            state.dispatch(AppCommand::ExitToNav);
            if let Err(error) = refresh_species(state, runtime, view_data) {
                emit_status(state, view_data, internal_tx, format!("reload failed: {error}"));
            } else {
                emit_status(state, view_data, internal_tx, done);
            }
        }
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("save failed: {error}"));
        }
    }
}

fn refresh_species<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    view_data.species = runtime.load_species()?;
    let len = filtered_rows(view_data, state).len();
    view_data.cursor = view_data.cursor.min(len.saturating_sub(1));
    Ok(())
}

fn filtered_rows<'a>(view_data: &'a ViewData, state: &AppState) -> Vec<&'a Species> {
    filter_species(&view_data.species, &state.query)
}

fn selected_species(view_data: &ViewData, state: &AppState) -> Option<Species> {
    filtered_rows(view_data, state)
        .get(view_data.cursor)
        .map(|species| (*species).clone())
}

fn move_cursor(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let len = filtered_rows(view_data, state).len();
    if len == 0 {
        view_data.cursor = 0;
        return;
    }
    let next = view_data.cursor as isize + delta;
    view_data.cursor = next.clamp(0, len as isize - 1) as usize;
}

fn render<R: AppRuntime>(
    frame: &mut ratatui::Frame<'_>,
    state: &AppState,
    view_data: &ViewData,
    runtime: &R,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(state, view_data))
        .block(Block::default().title("fieldguide").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_species_table(frame, layout[1], state, view_data);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if state.mode == AppMode::Detail
        && let Some(species) = selected_species(view_data, state)
    {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let card = Paragraph::new(detail_card_text(&species, runtime.current_user())).block(
            Block::default()
                .title(species.scientific_name.clone())
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(card, area);
    }

    if let AppMode::Form(kind) = state.mode
        && let Some(form) = &view_data.form
    {
        let area = centered_rect(64, 58, frame.area());
        frame.render_widget(Clear, area);
        let title = match kind {
            FormKind::Create => "new species",
            FormKind::Edit => "edit species",
        };
        let overlay = Paragraph::new(form_overlay_text(form))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(overlay, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 72, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_species_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let rows = filtered_rows(view_data, state);
    let table_rows = rows
        .iter()
        .enumerate()
        .map(|(index, species)| {
            let marker = if index == view_data.cursor {
                CURSOR_MARK
            } else {
                " "
            };
            let row = Row::new(vec![
                Cell::from(marker),
                Cell::from(species.scientific_name.clone()),
                Cell::from(species.common_name.clone().unwrap_or_default()),
                Cell::from(species.kingdom.as_str()),
                Cell::from(species.description_preview()),
            ]);
            if index == view_data.cursor {
                row.style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                row
            }
        })
        .collect::<Vec<Row>>();

    let table = Table::new(
        table_rows,
        [
            Constraint::Length(1),
            Constraint::Percentage(28),
            Constraint::Percentage(20),
            Constraint::Percentage(13),
            Constraint::Percentage(38),
        ],
    )
    .header(
        Row::new(vec!["", "scientific name", "common name", "kingdom", "description"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("species"));
    frame.render_widget(table, area);
}

fn header_text(state: &AppState, view_data: &ViewData) -> String {
    let shown = filtered_rows(view_data, state).len();
    let total = view_data.species.len();
    match state.mode {
        AppMode::Search => format!("search: {}▌  ({shown} of {total})", state.query),
        _ if !state.query.is_empty() => {
            format!("filter: {}  ({shown} of {total})", state.query)
        }
        _ => format!("{total} species"),
    }
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if let Some(status) = &state.status_line {
        return status.clone();
    }
    match state.mode {
        AppMode::Nav => "/ search  n new  e edit  enter detail  r refresh  ? help  q quit".to_owned(),
        AppMode::Search => "type to filter -- enter keeps the filter, esc clears it".to_owned(),
        AppMode::Detail => "e edit  esc back".to_owned(),
        AppMode::Form(_) => {
            let field = view_data
                .form
                .as_ref()
                .map(|form| form.active_field().label())
                .unwrap_or("field");
            format!("{field} -- tab next field, enter save, esc cancel")
        }
    }
}

fn detail_card_text(species: &Species, current_user: &UserId) -> String {
    let population = species
        .total_population
        .map(format_population)
        .unwrap_or_else(|| "unknown".to_owned());
    let mut lines = vec![
        format!("scientific name: {}", species.scientific_name),
        format!(
            "common name: {}",
            species.common_name.as_deref().unwrap_or("—")
        ),
        format!("kingdom: {}", species.kingdom.as_str()),
        format!("total population: {population}"),
        format!("image: {}", species.image.as_deref().unwrap_or("—")),
        String::new(),
    ];
    if let Some(description) = &species.description {
        lines.push(description.clone());
        lines.push(String::new());
    }
    if species.editable_by(current_user) {
        lines.push("press e to edit".to_owned());
    } else {
        lines.push("added by another user".to_owned());
    }
    lines.join("\n")
}

fn form_overlay_text(form: &FormUiState) -> String {
    let mut lines = Vec::with_capacity(SpeciesField::ALL.len() * 2);
    for (index, field) in SpeciesField::ALL.iter().enumerate() {
        let marker = if index == form.field_cursor % SpeciesField::ALL.len() {
            CURSOR_MARK
        } else {
            " "
        };
        let value = if *field == SpeciesField::Kingdom {
            format!("‹ {} ›", form.input.kingdom.as_str())
        } else {
            form.input.field_text(*field)
        };
        lines.push(format!("{marker} {}: {value}", field.label()));
        if let Some(error) = form.input.field_error(*field) {
            lines.push(format!("    ! {error}"));
        }
    }
    lines.join("\n")
}

fn help_overlay_text() -> String {
    [
        "/        search (each keystroke refetches, filter applies locally)",
        "enter    open record card",
        "n        new species",
        "e        edit selected species (author only)",
        "j / k    move selection",
        "g / G    jump to first / last row",
        "r        reload from the service",
        "esc      back",
        "q        quit",
        "",
        "form: tab/shift-tab move between fields, left/right cycle kingdom,",
        "enter saves, esc discards. blank optional fields are stored as null.",
    ]
    .join("\n")
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

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, FormUiState, InternalEvent, ViewData, detail_card_text, filtered_rows,
        form_overlay_text, handle_key_event, header_text, help_overlay_text,
        process_internal_events, selected_species, status_text,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use fieldguide_app::{
        AppCommand, AppMode, AppState, FormKind, Kingdom, Species, SpeciesFields,
        SpeciesFormInput, SpeciesId, UserId,
    };
    use std::sync::mpsc::{self, Sender};

    const ME: &str = "user-me";
    const OTHER: &str = "user-other";

    #[derive(Debug)]
    struct TestRuntime {
        user: UserId,
        species: Vec<Species>,
        load_count: usize,
        created: Vec<SpeciesFields>,
        updated: Vec<(SpeciesId, SpeciesFields)>,
        fail_next_save: Option<String>,
    }

    impl TestRuntime {
        fn new(species: Vec<Species>) -> Self {
            Self {
                user: UserId::new(ME),
                species,
                load_count: 0,
                created: Vec::new(),
                updated: Vec::new(),
                fail_next_save: None,
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn current_user(&self) -> &UserId {
            &self.user
        }

        fn load_species(&mut self) -> Result<Vec<Species>> {
            self.load_count += 1;
            Ok(self.species.clone())
        }

        fn create_species(&mut self, fields: &SpeciesFields) -> Result<Species> {
            if let Some(message) = self.fail_next_save.take() {
                return Err(anyhow!(message));
            }
            self.created.push(fields.clone());
            Ok(sample(99, ME, &fields.scientific_name))
        }

        fn update_species(&mut self, id: SpeciesId, fields: &SpeciesFields) -> Result<Species> {
            if let Some(message) = self.fail_next_save.take() {
                return Err(anyhow!(message));
            }
            self.updated.push((id, fields.clone()));
            Ok(sample(id.get(), ME, &fields.scientific_name))
        }
    }

    fn sample(id: i64, author: &str, scientific_name: &str) -> Species {
        Species {
            id: SpeciesId::new(id),
            scientific_name: scientific_name.to_owned(),
            common_name: Some("Guinea pig".to_owned()),
            kingdom: Kingdom::Animalia,
            total_population: Some(700_000_000),
            image: None,
            description: Some("A domesticated rodent.".to_owned()),
            author: UserId::new(author),
        }
    }

    fn press(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &Sender<InternalEvent>,
        code: KeyCode,
    ) -> bool {
        handle_key_event(
            state,
            runtime,
            view_data,
            tx,
            KeyEvent::new(code, KeyModifiers::NONE),
        )
    }

    fn type_text(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &Sender<InternalEvent>,
        text: &str,
    ) {
        for ch in text.chars() {
            press(state, runtime, view_data, tx, KeyCode::Char(ch));
        }
    }

    fn fixture() -> (AppState, TestRuntime, ViewData, Sender<InternalEvent>) {
        let species = vec![
            sample(2, ME, "Cavia porcellus"),
            sample(1, OTHER, "Amanita muscaria"),
        ];
        let mut view_data = ViewData::default();
        view_data.species = species.clone();
        let (tx, _rx) = mpsc::channel();
        (AppState::default(), TestRuntime::new(species), view_data, tx)
    }

    #[test]
    fn quit_from_nav_mode() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();
        assert!(press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('q')));
    }

    #[test]
    fn each_search_keystroke_refetches_the_list() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('/'));
        assert_eq!(state.mode, AppMode::Search);
        assert_eq!(runtime.load_count, 0);

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "cavia");
        assert_eq!(state.query, "cavia");
        assert_eq!(runtime.load_count, 5);

        let rows = filtered_rows(&view_data, &state);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].scientific_name, "Cavia porcellus");
    }

    #[test]
    fn enter_keeps_the_filter_and_esc_clears_it() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('/'));
        type_text(&mut state, &mut runtime, &mut view_data, &tx, "guinea");
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(state.query, "guinea");

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('/'));
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Esc);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(state.query, "");
    }

    #[test]
    fn new_opens_a_blank_create_form() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('n'));
        assert_eq!(state.mode, AppMode::Form(FormKind::Create));
        let form = view_data.form.as_ref().expect("form expected");
        assert_eq!(form.input, SpeciesFormInput::blank());
        assert_eq!(form.editing, None);

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "Cavia aperea");
        let form = view_data.form.as_ref().expect("form expected");
        assert_eq!(form.input.scientific_name, "Cavia aperea");
    }

    #[test]
    fn edit_prefills_an_owned_record() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        view_data.cursor = 0;
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('e'));
        assert_eq!(state.mode, AppMode::Form(FormKind::Edit));
        let form = view_data.form.as_ref().expect("form expected");
        assert_eq!(form.editing, Some(SpeciesId::new(2)));
        assert_eq!(form.input.scientific_name, "Cavia porcellus");
    }

    #[test]
    fn edit_is_blocked_for_records_by_other_authors() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        view_data.cursor = 1;
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('e'));
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(view_data.form, None);
        let status = state.status_line.as_deref().expect("status expected");
        assert!(status.contains("author"));
    }

    #[test]
    fn invalid_population_blocks_submission_and_keeps_the_form() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('n'));
        if let Some(form) = view_data.form.as_mut() {
            form.input.scientific_name = "Cavia aperea".to_owned();
            form.input.total_population = "0".to_owned();
        }
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        assert_eq!(state.mode, AppMode::Form(FormKind::Create));
        assert!(view_data.form.is_some());
        assert!(runtime.created.is_empty());
        let status = state.status_line.as_deref().expect("status expected");
        assert!(status.contains("total population"));
    }

    #[test]
    fn valid_create_saves_and_closes_the_form() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('n'));
        if let Some(form) = view_data.form.as_mut() {
            form.input.scientific_name = "  Cavia aperea  ".to_owned();
            form.input.common_name = "   ".to_owned();
        }
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(view_data.form, None);
        assert_eq!(runtime.created.len(), 1);
        assert_eq!(runtime.created[0].scientific_name, "Cavia aperea");
        assert_eq!(runtime.created[0].common_name, None);
        assert_eq!(state.status_line.as_deref(), Some("species created"));
    }

    #[test]
    fn rejected_save_keeps_the_typed_input_intact() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();
        runtime.fail_next_save = Some("service error (409): duplicate key".to_owned());

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('n'));
        if let Some(form) = view_data.form.as_mut() {
            form.input.scientific_name = "Cavia aperea".to_owned();
        }
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        assert_eq!(state.mode, AppMode::Form(FormKind::Create));
        let form = view_data.form.as_ref().expect("form survives the failure");
        assert_eq!(form.input.scientific_name, "Cavia aperea");
        let status = state.status_line.as_deref().expect("status expected");
        assert!(status.contains("409"));
    }

    #[test]
    fn edit_submission_patches_the_selected_record() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        view_data.cursor = 0;
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('e'));
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        assert_eq!(runtime.updated.len(), 1);
        assert_eq!(runtime.updated[0].0, SpeciesId::new(2));
        assert_eq!(state.status_line.as_deref(), Some("species updated"));
    }

    #[test]
    fn kingdom_cycles_with_arrow_keys() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('n'));
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Tab);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Tab);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Right);
        let form = view_data.form.as_ref().expect("form expected");
        assert_eq!(form.input.kingdom, Kingdom::Plantae);

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Left);
        let form = view_data.form.as_ref().expect("form expected");
        assert_eq!(form.input.kingdom, Kingdom::Animalia);
    }

    #[test]
    fn detail_opens_only_with_a_selection() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);
        assert_eq!(state.mode, AppMode::Detail);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Esc);
        assert_eq!(state.mode, AppMode::Nav);

        view_data.species.clear();
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);
        assert_eq!(state.mode, AppMode::Nav);
    }

    #[test]
    fn status_clear_honors_the_latest_token() {
        let (mut state, _runtime, mut view_data, _tx) = fixture();
        let (tx, rx) = mpsc::channel();

        state.dispatch(AppCommand::SetStatus("species created".to_owned()));
        view_data.status_token = 2;

        tx.send(InternalEvent::ClearStatus { token: 1 }).expect("send");
        process_internal_events(&mut state, &view_data, &rx);
        assert_eq!(state.status_line.as_deref(), Some("species created"));

        tx.send(InternalEvent::ClearStatus { token: 2 }).expect("send");
        process_internal_events(&mut state, &view_data, &rx);
        assert_eq!(state.status_line, None);
    }

    #[test]
    fn detail_card_shows_population_and_edit_hint() {
        let species = sample(2, ME, "Cavia porcellus");
        let card = detail_card_text(&species, &UserId::new(ME));
        assert!(card.contains("700,000,000"));
        assert!(card.contains("press e to edit"));

        let card = detail_card_text(&species, &UserId::new(OTHER));
        assert!(card.contains("added by another user"));
    }

    #[test]
    fn form_overlay_flags_the_invalid_field_inline() {
        let mut input = SpeciesFormInput::blank();
        input.total_population = "many".to_owned();
        let form = FormUiState {
            input,
            field_cursor: 0,
            editing: None,
        };
        let text = form_overlay_text(&form);
        assert!(text.contains("! "));
        assert!(text.contains("whole number"));
    }

    #[test]
    fn header_and_status_reflect_the_mode() {
        let (mut state, _runtime, view_data, _tx) = fixture();
        assert_eq!(header_text(&state, &view_data), "2 species");

        state.dispatch(AppCommand::OpenSearch);
        state.dispatch(AppCommand::SetQuery("guinea".to_owned()));
        assert!(header_text(&state, &view_data).contains("search: guinea"));
        assert!(status_text(&state, &view_data).contains("type to filter"));

        assert!(help_overlay_text().contains("author only"));
    }

    #[test]
    fn cursor_clamps_to_the_filtered_list() {
        let (mut state, mut runtime, mut view_data, tx) = fixture();

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('j'));
        assert_eq!(view_data.cursor, 1);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('j'));
        assert_eq!(view_data.cursor, 1);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('g'));
        assert_eq!(view_data.cursor, 0);

        let selected = selected_species(&view_data, &state).expect("selection expected");
        assert_eq!(selected.id, SpeciesId::new(2));
    }
}
