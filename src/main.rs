use std::fs::{self, OpenOptions};
use std::io;
use std::sync::{Mutex, mpsc};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph, Wrap};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prediction_desk::config::{AppConfig, source_label};
use prediction_desk::error::FetchError;
use prediction_desk::export::export_history;
use prediction_desk::filter::{DateWindow, date_window_label, parse_kickoff};
use prediction_desk::history::HistoryStore;
use prediction_desk::prediction::{Prediction, Probabilities, ResultTag, Verdict, result_label};
use prediction_desk::state::{
    AppState, Delta, FetchStatus, ProviderCommand, View, apply_delta, status_label, view_label,
};
use prediction_desk::storage::{KeyValueStore, app_data_dir};
use prediction_desk::worker::spawn_prediction_worker;

const LOG_FILE: &str = "prediction_desk.log";
const DISCLAIMER: &str = concat!(
    "Recuerda: son predicciones estadísticas basadas en datos públicos ",
    "y no garantizan el resultado final."
);

struct App {
    state: AppState,
    history: HistoryStore<Box<dyn KeyValueStore>>,
    config: AppConfig,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
}

impl App {
    fn new(config: AppConfig, cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        let history = HistoryStore::open(config.open_storage());
        let mut state = AppState::new();
        state.push_log(format!(
            "[INFO] Source: {} | History: {} items",
            source_label(config.source),
            history.len()
        ));
        Self {
            state,
            history,
            config,
            should_quit: false,
            cmd_tx,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.help_overlay {
            match key.code {
                KeyCode::Char('?') | KeyCode::Esc => self.state.help_overlay = false,
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            }
            return;
        }

        if self.state.detail_open {
            match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('d') => {
                    self.state.detail_open = false
                }
                KeyCode::Char('m') => self.promote_selected(),
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            }
            return;
        }

        let history_len = self.history.len();
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            KeyCode::Tab => self.state.toggle_view(),
            KeyCode::Char('1') => self.state.view = View::Upcoming,
            KeyCode::Char('2') => self.state.view = View::History,
            KeyCode::Char('r') | KeyCode::Char('R') => self.request_predictions(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(history_len),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(history_len),
            _ => match self.state.view {
                View::Upcoming => self.on_upcoming_key(key),
                View::History => self.on_history_key(key),
            },
        }
    }

    fn on_upcoming_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char('d') => {
                if self.state.selected_prediction().is_some() {
                    self.state.detail_open = true;
                }
            }
            KeyCode::Char('m') => self.promote_selected(),
            KeyCode::Char('f') => self.state.cycle_date_window(),
            KeyCode::Char('h') | KeyCode::Left => self.state.league_cursor_prev(),
            KeyCode::Char('l') | KeyCode::Right => self.state.league_cursor_next(),
            KeyCode::Char(' ') => self.state.toggle_league_at_cursor(),
            KeyCode::Char('a') => self.state.select_all_leagues(),
            _ => {}
        }
    }

    fn on_history_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') => {
                self.state
                    .mark_selected_history(&mut self.history, Verdict::Correct);
            }
            KeyCode::Char('x') => {
                self.state
                    .mark_selected_history(&mut self.history, Verdict::Incorrect);
            }
            KeyCode::Delete | KeyCode::Backspace => {
                self.state.delete_selected_history(&mut self.history);
            }
            KeyCode::Char('e') => self.export(),
            _ => {}
        }
    }

    fn promote_selected(&mut self) {
        if self.state.promote_selected(&mut self.history).is_none() {
            self.state.push_log("[INFO] No prediction selected");
        }
    }

    // Single flight: the trigger is inert while a fetch is running.
    fn request_predictions(&mut self) {
        if !self.state.begin_fetch() {
            return;
        }
        let sent = self
            .cmd_tx
            .as_ref()
            .is_some_and(|tx| tx.send(ProviderCommand::FetchPredictions).is_ok());
        if !sent {
            warn!("prediction worker unavailable");
            apply_delta(
                &mut self.state,
                Delta::FetchFailed(FetchError::FetchFailed("worker unavailable".to_string())),
            );
        }
    }

    fn export(&mut self) {
        let path = self.config.export_path.clone();
        match export_history(&path, self.history.items(), self.history.summary()) {
            Ok(report) => {
                info!(rows = report.rows, path = %path.display(), "history exported");
                self.state.push_log(format!(
                    "[INFO] Exported {} items to {}",
                    report.rows,
                    path.display()
                ));
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "history export failed");
                self.state.push_log(format!("[WARN] Export failed: {err:#}"));
            }
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    if let Err(err) = init_tracing() {
        eprintln!("warning: {err:#}");
    }

    let config = AppConfig::from_env();
    info!(source = source_label(config.source), "starting");

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let _worker = spawn_prediction_worker(config.prediction_source(), tx, cmd_rx);
    let mut app = App::new(config, Some(cmd_tx));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    info!("stopped");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let Some(dir) = app_data_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("tracing init failed: {err}"))
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
            app.state.clamp_selection(app.history.len());
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(4),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_body(frame, chunks[1], app);

    let footer = Paragraph::new(footer_text(&app.state))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if app.state.detail_open
        && let Some(prediction) = app.state.selected_prediction()
    {
        render_detail_overlay(frame, frame.size(), prediction);
    }

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(app: &App) -> String {
    let state = &app.state;
    let tabs = [View::Upcoming, View::History]
        .into_iter()
        .map(|v| {
            if v == state.view {
                format!("[{}]", view_label(v))
            } else {
                format!(" {} ", view_label(v))
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let action = if state.is_loading() {
        "Analizando..."
    } else {
        "r Actualizar Predicciones"
    };
    let line1 = format!(
        "  PREDICCIONES IA | {} | Fuente: {}",
        status_label(&state.status),
        source_label(app.config.source)
    );
    let line2 = format!("  {tabs}    {action}");
    format!("{line1}\n{line2}")
}

fn footer_text(state: &AppState) -> String {
    let keys = match state.view {
        View::Upcoming => {
            concat!(
                "Tab Vista | r Actualizar | j/k Mover | Enter Detalle | m Al historial | ",
                "f Fecha | ←/→ Liga | Espacio Marcar | a Todas | ? Ayuda | q Salir"
            )
        }
        View::History => {
            concat!(
                "Tab Vista | r Actualizar | j/k Mover | c Acertada | x Fallada | ",
                "Supr Borrar | e Exportar | ? Ayuda | q Salir"
            )
        }
    };
    let console = state
        .logs
        .iter()
        .rev()
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n");
    format!("{keys}\n{console}")
}

fn render_body(frame: &mut Frame, area: Rect, app: &App) {
    match &app.state.status {
        FetchStatus::Loading => {
            let loader = Paragraph::new("Analizando partidos con la IA...")
                .style(Style::default().fg(Color::Yellow))
                .alignment(Alignment::Center);
            frame.render_widget(loader, area);
            return;
        }
        FetchStatus::Error(message) => {
            render_error(frame, area, message);
            return;
        }
        FetchStatus::Idle | FetchStatus::Loaded => {}
    }

    match app.state.view {
        View::Upcoming => render_upcoming(frame, area, &app.state),
        View::History => render_history(frame, area, app),
    }
}

fn render_error(frame: &mut Frame, area: Rect, message: &str) {
    let text = format!("{message}\n\nPulsa r para reintentar.");
    let error = Paragraph::new(text)
        .style(Style::default().fg(Color::Red))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Error").borders(Borders::ALL));
    frame.render_widget(error, centered_rect(60, 40, area));
}

fn render_upcoming(frame: &mut Frame, area: Rect, state: &AppState) {
    if state.predictions.is_none() {
        render_empty(frame, area, state.upcoming_empty_message().unwrap_or_default());
        return;
    }

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(area);

    render_filters(frame, sections[0], state);

    let widths = upcoming_columns();
    render_upcoming_header(frame, sections[1], &widths);

    let list_area = sections[2];
    if let Some(message) = state.upcoming_empty_message() {
        render_empty(frame, list_area, message);
        return;
    }

    let filtered = state.filtered_predictions();
    let visible = list_area.height as usize;
    let (start, end) = visible_range(state.selected, filtered.len(), visible);

    for (i, idx) in (start..end).enumerate() {
        let row_area = Rect {
            x: list_area.x,
            y: list_area.y + i as u16,
            width: list_area.width,
            height: 1,
        };
        let selected = idx == state.selected;
        let row_style = if selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        if selected {
            frame.render_widget(Block::default().style(row_style), row_area);
        }

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(widths)
            .split(row_area);

        let p = filtered[idx];
        let probs = &p.probabilities;
        let lda = format!("L{} E{} V{}", probs.local, probs.draw, probs.visitor);
        render_cell_text(frame, cols[0], &format_kickoff(&p.kickoff), row_style);
        render_cell_text(frame, cols[1], &p.match_label, row_style);
        render_cell_text(frame, cols[2], &p.league, row_style);
        render_cell_text(frame, cols[3], &lda, row_style);
        render_cell_text(
            frame,
            cols[4],
            &p.pick_label(),
            row_style.fg(Color::Cyan).add_modifier(Modifier::BOLD),
        );
    }
}

fn render_filters(frame: &mut Frame, area: Rect, state: &AppState) {
    let date_line = [DateWindow::All, DateWindow::Today, DateWindow::Upcoming]
        .into_iter()
        .map(|w| {
            if w == state.filters.date {
                format!("[{}]", date_window_label(w))
            } else {
                format!(" {} ", date_window_label(w))
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let all_marker = if state.filters.leagues.is_empty() {
        "[Todas]"
    } else {
        " Todas "
    };
    let mut league_spans = vec![Span::styled(
        all_marker,
        Style::default().fg(Color::Green),
    )];
    for (idx, league) in state.available_leagues().iter().enumerate() {
        let mut style = Style::default();
        if state.filters.is_league_selected(league) {
            style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        if idx == state.league_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        league_spans.push(Span::raw(" "));
        league_spans.push(Span::styled(league.clone(), style));
    }

    let text = vec![
        Line::from(format!("Fecha: {date_line}")),
        Line::from(league_spans),
    ];
    let filters = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Filtros").borders(Borders::TOP));
    frame.render_widget(filters, area);
}

fn render_history(frame: &mut Frame, area: Rect, app: &App) {
    let items = app.history.items();
    if items.is_empty() {
        render_empty(frame, area, "Tu historial de predicciones está vacío.");
        return;
    }

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let summary = app.history.summary();
    let accuracy = summary
        .accuracy()
        .map(|a| format!("{:.0}%", a * 100.0))
        .unwrap_or_else(|| "-".to_string());
    let summary_line = format!(
        "Total {} | Pendientes {} | Acertadas {} | Falladas {} | Acierto {}",
        summary.total(),
        summary.pending,
        summary.correct,
        summary.incorrect,
        accuracy
    );
    render_cell_text(
        frame,
        sections[0],
        &summary_line,
        Style::default().add_modifier(Modifier::BOLD),
    );

    let list_area = sections[1];
    let visible = list_area.height as usize;
    let (start, end) = visible_range(app.state.history_selected, items.len(), visible);
    let widths = history_columns();

    for (i, idx) in (start..end).enumerate() {
        let row_area = Rect {
            x: list_area.x,
            y: list_area.y + i as u16,
            width: list_area.width,
            height: 1,
        };
        let selected = idx == app.state.history_selected;
        let row_style = if selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        if selected {
            frame.render_widget(Block::default().style(row_style), row_area);
        }

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(widths)
            .split(row_area);

        let item = &items[idx];
        let tag_style = match item.result {
            ResultTag::Pending => row_style.fg(Color::Gray),
            ResultTag::Correct => row_style.fg(Color::Green).add_modifier(Modifier::BOLD),
            ResultTag::Incorrect => row_style.fg(Color::Red).add_modifier(Modifier::BOLD),
        };
        render_cell_text(frame, cols[0], result_label(item.result), tag_style);
        render_cell_text(frame, cols[1], &item.prediction.match_label, row_style);
        render_cell_text(frame, cols[2], &item.prediction.league, row_style);
        render_cell_text(frame, cols[3], &item.prediction.pick_label(), row_style);
    }
}

fn render_empty(frame: &mut Frame, area: Rect, message: &str) {
    let empty = Paragraph::new(message)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    let y = area.y + area.height / 3;
    let line = Rect {
        x: area.x,
        y,
        width: area.width,
        height: 1.min(area.height),
    };
    frame.render_widget(empty, line);
}

fn upcoming_columns() -> [Constraint; 5] {
    [
        Constraint::Length(13),
        Constraint::Min(24),
        Constraint::Length(18),
        Constraint::Length(14),
        Constraint::Min(16),
    ]
}

fn history_columns() -> [Constraint; 4] {
    [
        Constraint::Length(11),
        Constraint::Min(24),
        Constraint::Length(18),
        Constraint::Min(16),
    ]
}

fn render_upcoming_header(frame: &mut Frame, area: Rect, widths: &[Constraint]) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(widths)
        .split(area);
    let style = Style::default().add_modifier(Modifier::BOLD);

    render_cell_text(frame, cols[0], "Fecha (UTC)", style);
    render_cell_text(frame, cols[1], "Partido", style);
    render_cell_text(frame, cols[2], "Liga", style);
    render_cell_text(frame, cols[3], "L/E/V %", style);
    render_cell_text(frame, cols[4], "Predicción", style);
}

fn render_cell_text(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    let text_area = Rect {
        x: area.x,
        y: area.y + (area.height / 2),
        width: area.width,
        height: 1.min(area.height),
    };
    let paragraph = Paragraph::new(text).style(style);
    frame.render_widget(paragraph, text_area);
}

fn probability_bar_chart(probs: &Probabilities) -> BarChart<'static> {
    let local = Bar::default()
        .value(u64::from(probs.local))
        .label("Local".into())
        .style(Style::default().fg(Color::Green));
    let draw = Bar::default()
        .value(u64::from(probs.draw))
        .label("Empate".into())
        .style(Style::default().fg(Color::Yellow));
    let visitor = Bar::default()
        .value(u64::from(probs.visitor))
        .label("Visitante".into())
        .style(Style::default().fg(Color::Red));

    BarChart::default()
        .data(BarGroup::default().bars(&[local, draw, visitor]))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .group_gap(0)
        .max(100)
}

fn render_detail_overlay(frame: &mut Frame, area: Rect, prediction: &Prediction) {
    let popup_area = centered_rect(70, 70, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(prediction.match_label.clone())
        .borders(Borders::ALL);
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(4),
            Constraint::Length(2),
        ])
        .split(inner);

    let heading = format!(
        "{} | {}\nPredicción: {}",
        prediction.league,
        format_kickoff(&prediction.kickoff),
        prediction.pick_label()
    );
    frame.render_widget(Paragraph::new(heading), rows[0]);

    let analysis = Paragraph::new(prediction.rationale.as_str())
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Análisis de la IA").borders(Borders::TOP));
    frame.render_widget(analysis, rows[1]);

    frame.render_widget(probability_bar_chart(&prediction.probabilities), rows[2]);

    let disclaimer = Paragraph::new(DISCLAIMER)
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    frame.render_widget(disclaimer, rows[3]);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 || visible == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn format_kickoff(raw: &str) -> String {
    match parse_kickoff(raw) {
        Some(dt) => dt.format("%d/%m %H:%M").to_string(),
        None if raw.trim().is_empty() => "Por definir".to_string(),
        None => raw.trim().chars().take(16).collect(),
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Predicciones IA - Ayuda",
        "",
        "General:",
        "  Tab / 1 / 2  Cambiar de vista",
        "  r            Actualizar predicciones",
        "  j/k o ↑/↓    Mover selección",
        "  ?            Ayuda",
        "  q            Salir",
        "",
        "Próximas:",
        "  Enter / d    Ver detalle",
        "  m            Mover al historial",
        "  f            Filtro de fecha (Todos/Hoy/Próximos)",
        "  ←/→          Elegir liga",
        "  Espacio      Marcar/desmarcar liga",
        "  a            Todas las ligas",
        "",
        "Historial:",
        "  c / x        Acertada / Fallada",
        "  Supr         Borrar",
        "  e            Exportar a Excel",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Ayuda").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
