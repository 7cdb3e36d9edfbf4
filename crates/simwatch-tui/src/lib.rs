// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Block, Borders, Cell, Chart, Clear, Dataset, Gauge, GraphType, Paragraph, Row, Table,
    Tabs,
};
use simwatch_app::{
    AxisBounds, AxisFrame, AxisScale, ChartView, JobId, LegendEntry, Notification, PollRequest,
    ProgressBar, ProgressState, RenderFrame, ResultPayload, Session, SessionCommand, SessionEvent,
    SimulationStatus,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use time::macros::format_description;

const CURSOR_STEP: f64 = 0.02;
const CURSOR_STEP_FAST: f64 = 0.1;
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);
const INPUT_POLL: Duration = Duration::from_millis(120);
const MAX_NOTIFICATION_ROWS: u16 = 4;

const PALETTE: [Color; 8] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::LightRed,
    Color::LightBlue,
    Color::LightYellow,
    Color::LightMagenta,
];

/// Network side of the dashboard. The `spawn_*` defaults run inline; the
/// binary overrides them with worker threads.
pub trait DashboardRuntime {
    fn fetch_statuses(
        &mut self,
        skip_update: bool,
        ids: &[JobId],
    ) -> Result<Vec<SimulationStatus>>;
    fn fetch_results(&mut self, job: JobId) -> Result<ResultPayload>;
    fn spawn_status_poll(&mut self, request: PollRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .fetch_statuses(request.skip_update, &request.ids)
            .map_err(|error| format!("{error:#}"));
        tx.send(InternalEvent::StatusPolled {
            generation: request.generation,
            result,
        })
        .map_err(|_| anyhow!("poll event channel closed"))?;
        Ok(())
    }
    fn spawn_results_download(&mut self, job: JobId, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .fetch_results(job)
            .map_err(|error| format!("{error:#}"));
        tx.send(InternalEvent::ResultsLoaded { job, result })
            .map_err(|_| anyhow!("download event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    StatusPolled {
        generation: u64,
        result: Result<Vec<SimulationStatus>, String>,
    },
    ResultsLoaded {
        job: JobId,
        result: Result<ResultPayload, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
struct UiState {
    job_cursor: usize,
    legend_cursor: usize,
    // Chart cursor as fractions of the visible plot area.
    chart_cursor: Option<(f64, f64)>,
    // First corner of a pending zoom selection, in data space.
    selection_anchor: Option<(f64, f64)>,
    help_visible: bool,
    status_token: u64,
}

pub fn run_app<R: DashboardRuntime>(session: &mut Session, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut ui = UiState::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    let events = session.start();
    apply_session_events(session, runtime, &mut ui, &internal_tx, events);

    let mut result = Ok(());
    loop {
        process_internal_events(session, runtime, &mut ui, &internal_tx, &internal_rx);
        drive_scheduled_poll(session, runtime, &mut ui, &internal_tx, Instant::now());

        if let Err(error) = terminal.draw(|frame| render(frame, session, &ui)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(INPUT_POLL).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(session, runtime, &mut ui, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: DashboardRuntime>(
    session: &mut Session,
    runtime: &mut R,
    ui: &mut UiState,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        let events = match event {
            InternalEvent::ClearStatus { token } if token == ui.status_token => {
                session.dispatch(SessionCommand::ClearStatus)
            }
            InternalEvent::ClearStatus { .. } => Vec::new(),
            InternalEvent::StatusPolled {
                generation,
                result: Ok(statuses),
            } => session.apply_poll_response(generation, statuses, Instant::now()),
            InternalEvent::StatusPolled {
                generation,
                result: Err(error),
            } => session.apply_poll_failure(generation, &error, Instant::now()),
            InternalEvent::ResultsLoaded {
                job,
                result: Ok(payload),
            } => session.apply_results(job, payload, OffsetDateTime::now_utc()),
            InternalEvent::ResultsLoaded {
                job,
                result: Err(error),
            } => session.apply_results_failure(job, &error),
        };
        apply_session_events(session, runtime, ui, tx, events);
    }
}

fn drive_scheduled_poll<R: DashboardRuntime>(
    session: &mut Session,
    runtime: &mut R,
    ui: &mut UiState,
    tx: &Sender<InternalEvent>,
    now: Instant,
) {
    if let Some(request) = session.poll_due(now) {
        apply_session_events(session, runtime, ui, tx, vec![SessionEvent::PollStarted(request)]);
    }
}

fn apply_session_events<R: DashboardRuntime>(
    session: &mut Session,
    runtime: &mut R,
    ui: &mut UiState,
    tx: &Sender<InternalEvent>,
    events: Vec<SessionEvent>,
) {
    for event in events {
        match event {
            SessionEvent::PollStarted(request) => {
                let generation = request.generation;
                if let Err(error) = runtime.spawn_status_poll(request, tx.clone()) {
                    let error = format!("{error:#}");
                    tracing::warn!(generation, %error, "could not start status poll");
                    let follow_up = session.apply_poll_failure(generation, &error, Instant::now());
                    apply_session_events(session, runtime, ui, tx, follow_up);
                }
            }
            SessionEvent::DownloadRequested(job) => {
                if let Err(error) = runtime.spawn_results_download(job, tx.clone()) {
                    let error = format!("{error:#}");
                    tracing::warn!(%job, %error, "could not start results download");
                    let follow_up = session.apply_results_failure(job, &error);
                    apply_session_events(session, runtime, ui, tx, follow_up);
                }
            }
            SessionEvent::StatusUpdated(_) => {
                ui.status_token = ui.status_token.saturating_add(1);
                schedule_status_clear(tx, ui.status_token);
            }
            SessionEvent::PageChanged(_) => {
                ui.job_cursor = 0;
            }
            SessionEvent::ViewActivated(_) => {
                ui.legend_cursor = 0;
                ui.selection_anchor = None;
            }
            SessionEvent::Rerender(_) | SessionEvent::JobSelected(_) => {
                let entries = session.legend().len();
                ui.legend_cursor = ui.legend_cursor.min(entries.saturating_sub(1));
            }
            SessionEvent::NotificationsDismissed | SessionEvent::StatusCleared => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn handle_key_event<R: DashboardRuntime>(
    session: &mut Session,
    runtime: &mut R,
    ui: &mut UiState,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if ui.help_visible {
        ui.help_visible = false;
        return false;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    let fast = key.modifiers.contains(KeyModifiers::SHIFT);
    let events = match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => {
            ui.help_visible = true;
            Vec::new()
        }
        KeyCode::Char('j') => {
            move_job_cursor(session, ui, 1);
            Vec::new()
        }
        KeyCode::Char('k') => {
            move_job_cursor(session, ui, -1);
            Vec::new()
        }
        KeyCode::Enter => match session.pager().current_ids().get(ui.job_cursor).copied() {
            Some(job) => session.dispatch(SessionCommand::SelectJob(job)),
            None => Vec::new(),
        },
        KeyCode::Char('n') => session.dispatch(SessionCommand::NextPage),
        KeyCode::Char('p') => session.dispatch(SessionCommand::PrevPage),
        KeyCode::Char('g') => session.dispatch(SessionCommand::Refresh),
        KeyCode::Tab => session.dispatch(SessionCommand::NextView),
        KeyCode::BackTab => session.dispatch(SessionCommand::PrevView),
        KeyCode::Char(digit @ '1'..='4') => {
            let index = digit as usize - '1' as usize;
            session.dispatch(SessionCommand::ActivateView(ChartView::ALL[index]))
        }
        KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down => {
            let direction = match key.code {
                KeyCode::Left => (-1.0, 0.0),
                KeyCode::Right => (1.0, 0.0),
                KeyCode::Up => (0.0, 1.0),
                _ => (0.0, -1.0),
            };
            move_chart_cursor(session, ui, direction, fast);
            Vec::new()
        }
        KeyCode::Char('v') => toggle_selection(session, ui),
        KeyCode::Esc => {
            if ui.selection_anchor.take().is_none() {
                ui.chart_cursor = None;
            }
            Vec::new()
        }
        KeyCode::Char('r') => session.dispatch(SessionCommand::ResetZoom),
        KeyCode::Char('[') => {
            ui.legend_cursor = ui.legend_cursor.saturating_sub(1);
            Vec::new()
        }
        KeyCode::Char(']') => {
            if ui.legend_cursor + 1 < session.legend().len() {
                ui.legend_cursor += 1;
            }
            Vec::new()
        }
        KeyCode::Char(' ') => {
            let series = session
                .legend()
                .get(ui.legend_cursor)
                .map(|entry| entry.series);
            match series {
                Some(series) => session.dispatch(SessionCommand::ToggleSeries(series)),
                None => Vec::new(),
            }
        }
        KeyCode::Char('c') => {
            let group = session
                .legend()
                .get(ui.legend_cursor)
                .and_then(|entry| entry.confidence.clone());
            match group {
                Some(percentage) => session.dispatch(SessionCommand::ToggleConfidence(percentage)),
                None => session.dispatch(SessionCommand::SetStatus(
                    "selected series has no confidence band".to_owned(),
                )),
            }
        }
        KeyCode::Char('d') => session.dispatch(SessionCommand::DismissNotifications),
        _ => Vec::new(),
    };

    apply_session_events(session, runtime, ui, internal_tx, events);
    false
}

fn move_job_cursor(session: &Session, ui: &mut UiState, delta: isize) {
    let rows = session.pager().current_ids().len();
    if rows == 0 {
        ui.job_cursor = 0;
        return;
    }
    let next = (ui.job_cursor as isize + delta).clamp(0, rows as isize - 1);
    ui.job_cursor = next as usize;
}

fn move_chart_cursor(session: &Session, ui: &mut UiState, direction: (f64, f64), fast: bool) {
    if session.render_frame().is_none() {
        return;
    }
    let step = if fast { CURSOR_STEP_FAST } else { CURSOR_STEP };
    let (x, y) = ui.chart_cursor.unwrap_or((0.5, 0.5));
    ui.chart_cursor = Some((
        (x + direction.0 * step).clamp(0.0, 1.0),
        (y + direction.1 * step).clamp(0.0, 1.0),
    ));
}

fn toggle_selection(session: &mut Session, ui: &mut UiState) -> Vec<SessionEvent> {
    let Some(frame) = session.render_frame() else {
        return Vec::new();
    };
    let cursor = *ui.chart_cursor.get_or_insert((0.5, 0.5));
    let point = cursor_data_point(&frame, cursor);

    match ui.selection_anchor.take() {
        None => {
            ui.selection_anchor = Some(point);
            session.dispatch(SessionCommand::SetStatus(
                "selecting: move the cursor, v to zoom, esc to cancel".to_owned(),
            ))
        }
        Some(anchor) => {
            ui.chart_cursor = Some((0.5, 0.5));
            let events =
                session.dispatch(SessionCommand::Zoom(AxisBounds::from_corners(anchor, point)));
            if events.is_empty() {
                session.dispatch(SessionCommand::SetStatus(
                    "selection too small to zoom".to_owned(),
                ))
            } else {
                events
            }
        }
    }
}

fn axis_fraction_to_plot(axis: &AxisFrame, fraction: f64) -> f64 {
    let [low, high] = axis.bounds;
    low + (high - low) * fraction
}

fn cursor_plot_point(frame: &RenderFrame, cursor: (f64, f64)) -> (f64, f64) {
    (
        axis_fraction_to_plot(&frame.x_axis, cursor.0),
        axis_fraction_to_plot(&frame.y_axis, cursor.1),
    )
}

fn cursor_data_point(frame: &RenderFrame, cursor: (f64, f64)) -> (f64, f64) {
    let (x, y) = cursor_plot_point(frame, cursor);
    (frame.x_axis.scale.unproject(x), frame.y_axis.scale.unproject(y))
}

fn selection_outline(frame: &RenderFrame, anchor: (f64, f64), corner: (f64, f64)) -> Vec<(f64, f64)> {
    let x0 = frame
        .x_axis
        .scale
        .project(anchor.0)
        .unwrap_or(frame.x_axis.bounds[0]);
    let y0 = frame
        .y_axis
        .scale
        .project(anchor.1)
        .unwrap_or(frame.y_axis.bounds[0]);
    let (x1, y1) = corner;
    vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]
}

fn series_color(color_index: usize) -> Color {
    PALETTE[color_index % PALETTE.len()]
}

fn render(frame: &mut ratatui::Frame<'_>, session: &Session, ui: &UiState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_view_bar(frame, layout[0], session);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
        .split(layout[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(body[0]);
    render_jobs(frame, left[0], session, ui);
    render_gauge(frame, left[1], session, ui);

    let notifications = session.notifications();
    let notification_height = notification_height(notifications.len());
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(notification_height),
            Constraint::Length(7),
        ])
        .split(body[1]);
    render_chart(frame, right[0], session, ui);

    if !notifications.is_empty() {
        let notes = Paragraph::new(notifications_text(notifications))
            .style(Style::default().fg(Color::Yellow))
            .block(
                Block::default()
                    .title("notifications (d dismiss)")
                    .borders(Borders::ALL),
            );
        frame.render_widget(notes, right[1]);
    }

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(right[2]);
    render_legend(frame, bottom[0], session, ui);
    let hover = Paragraph::new(hover_text(session, ui))
        .block(Block::default().title("cursor").borders(Borders::ALL));
    frame.render_widget(hover, bottom[1]);

    let status = Paragraph::new(status_text(session, ui))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if ui.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn notification_height(count: usize) -> u16 {
    if count == 0 {
        return 0;
    }
    count.min(usize::from(MAX_NOTIFICATION_ROWS)) as u16 + 2
}

fn render_view_bar(frame: &mut ratatui::Frame<'_>, area: Rect, session: &Session) {
    let controls = session.switch_controls();
    let titles = ChartView::ALL
        .iter()
        .enumerate()
        .map(|(index, view)| {
            let control = controls.iter().find(|control| control.view == *view);
            let usable = control.is_some_and(|control| control.enabled || control.active);
            let style = if usable {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Line::from(Span::styled(format!("{} {}", index + 1, view.label()), style))
        })
        .collect::<Vec<_>>();
    let selected = controls
        .iter()
        .position(|control| control.active)
        .unwrap_or(0);

    let tabs = Tabs::new(titles)
        .block(Block::default().title("simwatch").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, area);
}

fn render_jobs(frame: &mut ratatui::Frame<'_>, area: Rect, session: &Session, ui: &UiState) {
    let header = Row::new(["job", "status", "progress", "detail"].map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = session
        .pager()
        .current_ids()
        .iter()
        .enumerate()
        .map(|(row_index, job)| {
            let mut style = match session.progress(*job).map(|bar| bar.state) {
                Some(ProgressState::Complete) => Style::default().fg(Color::Green),
                Some(ProgressState::Failed) => Style::default().fg(Color::Red),
                _ => Style::default(),
            };
            if row_index == ui.job_cursor {
                style = style.bg(Color::DarkGray);
            }
            Row::new(job_row_cells(session, *job)).style(style)
        });

    let widths = [
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(9),
        Constraint::Min(8),
    ];
    let pager = session.pager();
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(format!(
                    "jobs (page {}/{})",
                    pager.page() + 1,
                    pager.page_count()
                ))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn job_row_cells(session: &Session, job: JobId) -> [String; 4] {
    let marker = if session.displayed_job() == Some(job) {
        "*"
    } else {
        " "
    };
    let status = session
        .status(job)
        .map(|status| status.status.as_str())
        .unwrap_or("-");
    let bar = session.progress(job);
    [
        format!("{marker}{job}"),
        status.to_owned(),
        progress_cell_text(bar),
        bar.map(|bar| bar.label.clone()).unwrap_or_default(),
    ]
}

fn progress_cell_text(bar: Option<&ProgressBar>) -> String {
    match bar {
        Some(bar) if bar.state == ProgressState::Failed => "failed".to_owned(),
        Some(ProgressBar {
            value: Some(value), ..
        }) => format!("{value:>3}%"),
        _ => "-".to_owned(),
    }
}

fn render_gauge(frame: &mut ratatui::Frame<'_>, area: Rect, session: &Session, ui: &UiState) {
    let job = session.pager().current_ids().get(ui.job_cursor).copied();
    let bar = job.and_then(|job| session.progress(job));
    let color = match bar.map(|bar| bar.state) {
        Some(ProgressState::Complete) => Color::Green,
        Some(ProgressState::Failed) => Color::Red,
        _ => Color::Cyan,
    };
    let title = job.map(|job| format!("job {job}")).unwrap_or_default();
    let label = bar.map(|bar| bar.label.clone()).unwrap_or_default();
    let gauge = Gauge::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .percent(bar.map(ProgressBar::percent).unwrap_or(0).min(100))
        .label(label);
    frame.render_widget(gauge, area);
}

fn render_chart(frame: &mut ratatui::Frame<'_>, area: Rect, session: &Session, ui: &UiState) {
    let Some(render) = session.render_frame() else {
        let text = if session.displayed_job().is_some() {
            "no plottable data for this job"
        } else {
            "waiting for a finished simulation"
        };
        let empty = Paragraph::new(text).block(Block::default().title("graph").borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };

    let cursor = ui.chart_cursor.map(|cursor| cursor_plot_point(&render, cursor));
    let cursor_points = cursor.map(|point| vec![point]).unwrap_or_default();
    let selection_points = match (ui.selection_anchor, cursor) {
        (Some(anchor), Some(corner)) => selection_outline(&render, anchor, corner),
        _ => Vec::new(),
    };

    let mut datasets = render
        .series
        .iter()
        .map(|series| {
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(series_color(series.color_index)))
                .data(&series.points)
        })
        .collect::<Vec<_>>();
    if render.show_points {
        datasets.extend(render.series.iter().map(|series| {
            Dataset::default()
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(series_color(series.color_index)))
                .data(&series.points)
        }));
    }
    if !selection_points.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::White))
                .data(&selection_points),
        );
    }
    if !cursor_points.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::White))
                .data(&cursor_points),
        );
    }

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(chart_title(session, &render))
                .borders(Borders::ALL),
        )
        .x_axis(axis_widget(&render.x_axis))
        .y_axis(axis_widget(&render.y_axis))
        .legend_position(None);
    frame.render_widget(chart, area);
}

fn chart_title(session: &Session, render: &RenderFrame) -> String {
    let job = session
        .displayed_job()
        .map(|job| format!(" | job {job}"))
        .unwrap_or_default();
    let zoom = if render.fixed_axes { " | zoomed (r reset)" } else { "" };
    format!("{}{job}{zoom}", render.title)
}

fn axis_widget(axis: &AxisFrame) -> Axis<'static> {
    let title = match axis.scale {
        AxisScale::Log => format!("{} [log]", axis.label),
        AxisScale::Linear => axis.label.clone(),
    };
    Axis::default()
        .title(title)
        .style(Style::default().fg(Color::Gray))
        .bounds(axis.bounds)
        .labels(axis.tick_labels())
}

fn render_legend(frame: &mut ratatui::Frame<'_>, area: Rect, session: &Session, ui: &UiState) {
    let entries = session.legend();
    let lines = legend_lines(&entries, ui.legend_cursor)
        .into_iter()
        .zip(&entries)
        .map(|(text, entry)| {
            let mut style = Style::default().fg(series_color(entry.color_index));
            if !entry.enabled {
                style = style.fg(Color::DarkGray);
            }
            Line::from(Span::styled(text, style))
        })
        .collect::<Vec<_>>();
    let legend = Paragraph::new(lines)
        .block(Block::default().title("legend").borders(Borders::ALL));
    frame.render_widget(legend, area);
}

fn legend_lines(entries: &[LegendEntry], cursor: usize) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let pointer = if index == cursor { ">" } else { " " };
            format!("{pointer}{} {}", entry.glyph(), entry.label)
        })
        .collect()
}

fn hover_text(session: &Session, ui: &UiState) -> String {
    let (Some(frame), Some(cursor)) = (session.render_frame(), ui.chart_cursor) else {
        return "arrows move the cursor".to_owned();
    };
    let Some(info) = session.hover(cursor_data_point(&frame, cursor)) else {
        return String::new();
    };

    let mut lines = info.pointer_lines().to_vec();
    if let Some(tooltip) = info.tooltip() {
        lines.push(tooltip);
    }
    if ui.selection_anchor.is_some() {
        lines.push("v zoom | esc cancel".to_owned());
    }
    lines.join("\n")
}

fn notifications_text(notifications: &[Notification]) -> String {
    let format = format_description!("[hour]:[minute]:[second]");
    notifications
        .iter()
        .map(|notification| {
            let at = notification
                .received_at
                .format(format)
                .unwrap_or_default();
            format!("{at} job {}: {}", notification.job, notification.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn status_text(session: &Session, ui: &UiState) -> String {
    if ui.help_visible {
        return String::new();
    }

    let poller = session.poller();
    let polling = if poller.is_paused() {
        "polling paused (g retry)".to_owned()
    } else if poller.poll_set().is_empty() {
        "idle".to_owned()
    } else {
        format!("polling {}", poller.poll_set().len())
    };
    let default = "j/k enter | n/p page | g refresh | tab 1-4 view | arrows v r zoom | [ ] space c legend | d | ? | q";
    match session.status_line() {
        Some(status) => format!("{polling} | {status} | {default}"),
        None => format!("{polling} | {default}"),
    }
}

fn help_overlay_text() -> &'static str {
    "global: q or ctrl+c quit | ? help | g refresh (restarts paused polling)\n\
jobs: j/k move | enter show graph | n/p next/previous page\n\
views: tab/shift+tab cycle | 1 APD90 | 2 qNet | 3 PK/PD | 4 traces\n\
chart: arrows move cursor (shift faster) | v start/commit zoom | esc cancel | r reset zoom\n\
legend: [/] move | space toggle series | c toggle confidence band\n\
notifications: d dismiss"
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
        DashboardRuntime, InternalEvent, UiState, apply_session_events, drive_scheduled_poll,
        handle_key_event, help_overlay_text, legend_lines, notification_height,
        notifications_text, process_internal_events, progress_cell_text, render, status_text,
    };
    use anyhow::{Result, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use simwatch_app::{
        ChartView, JobId, JobStatus, Notification, PollPolicy, ProgressBar, ProgressState,
        ResultPayload, ResultSource, Session, SimulationStatus,
    };
    use simwatch_testkit::{
        FakeResultSource, fixture_datetime, payload_with_notes, payload_without_qnet, status,
    };
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[derive(Debug, Default)]
    struct TestRuntime {
        statuses: Vec<SimulationStatus>,
        results: FakeResultSource,
        fail_polls: bool,
        status_calls: Vec<(bool, Vec<JobId>)>,
    }

    impl DashboardRuntime for TestRuntime {
        fn fetch_statuses(
            &mut self,
            skip_update: bool,
            ids: &[JobId],
        ) -> Result<Vec<SimulationStatus>> {
            self.status_calls.push((skip_update, ids.to_vec()));
            if self.fail_polls {
                bail!("cannot reach http://127.0.0.1:1");
            }
            Ok(self.statuses.clone())
        }

        fn fetch_results(&mut self, job: JobId) -> Result<ResultPayload> {
            self.results.fetch_results(job)
        }
    }

    struct Harness {
        session: Session,
        runtime: TestRuntime,
        ui: UiState,
        tx: mpsc::Sender<InternalEvent>,
        rx: mpsc::Receiver<InternalEvent>,
    }

    impl Harness {
        fn new(jobs: &[i64], runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                session: Session::new(
                    jobs.iter().copied().map(JobId::new),
                    PollPolicy::default(),
                    10,
                ),
                runtime,
                ui: UiState::default(),
                tx,
                rx,
            }
        }

        fn start(&mut self) {
            let events = self.session.start();
            apply_session_events(
                &mut self.session,
                &mut self.runtime,
                &mut self.ui,
                &self.tx,
                events,
            );
            self.drain();
        }

        fn drain(&mut self) {
            process_internal_events(
                &mut self.session,
                &mut self.runtime,
                &mut self.ui,
                &self.tx,
                &self.rx,
            );
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.press_with(code, KeyModifiers::NONE)
        }

        fn press_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            let quit = handle_key_event(
                &mut self.session,
                &mut self.runtime,
                &mut self.ui,
                &self.tx,
                KeyEvent::new(code, modifiers),
            );
            self.drain();
            quit
        }
    }

    fn finished_harness() -> Harness {
        let runtime = TestRuntime {
            statuses: vec![status(5, JobStatus::Success, "Done")],
            results: FakeResultSource::default()
                .with_payload(JobId::new(5), payload_without_qnet()),
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(&[5], runtime);
        harness.start();
        harness
    }

    #[test]
    fn success_downloads_results_once() {
        let mut harness = finished_harness();
        assert_eq!(
            harness.runtime.status_calls,
            vec![(true, vec![JobId::new(5)])]
        );
        assert_eq!(harness.runtime.results.fetches(JobId::new(5)), 1);
        assert!(harness.session.graphs().is_loaded(JobId::new(5)));
        assert_eq!(harness.session.active_view(), Some(ChartView::PrimaryCurve));

        harness.press(KeyCode::Char('g'));
        assert_eq!(harness.runtime.status_calls.len(), 2);
        assert_eq!(harness.runtime.results.fetches(JobId::new(5)), 1);
    }

    #[test]
    fn running_job_is_polled_again_without_skip_update() {
        let runtime = TestRuntime {
            statuses: vec![status(5, JobStatus::Running, "42% completed")],
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(&[5], runtime);
        harness.start();
        assert_eq!(harness.runtime.results.fetches(JobId::new(5)), 0);
        assert_eq!(
            harness.session.progress(JobId::new(5)).and_then(|bar| bar.value),
            Some(42)
        );

        drive_scheduled_poll(
            &mut harness.session,
            &mut harness.runtime,
            &mut harness.ui,
            &harness.tx,
            Instant::now() + Duration::from_secs(4),
        );
        assert_eq!(
            harness.runtime.status_calls,
            vec![(true, vec![JobId::new(5)]), (false, vec![JobId::new(5)])]
        );
    }

    #[test]
    fn failed_poll_reports_retry() {
        let runtime = TestRuntime {
            fail_polls: true,
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(&[5], runtime);
        harness.start();
        let line = harness.session.status_line().unwrap_or_default();
        assert!(line.contains("retrying in 3s"), "status was {line:?}");
        assert_eq!(harness.session.poller().consecutive_failures(), 1);
    }

    #[test]
    fn view_keys_respect_empty_views() {
        let mut harness = finished_harness();
        harness.press(KeyCode::Char('2'));
        assert_eq!(harness.session.active_view(), Some(ChartView::PrimaryCurve));

        harness.press(KeyCode::Tab);
        assert_eq!(harness.session.active_view(), Some(ChartView::Traces));
        harness.press(KeyCode::Char('1'));
        assert_eq!(harness.session.active_view(), Some(ChartView::PrimaryCurve));
    }

    #[test]
    fn selection_keys_zoom_and_reset() {
        let mut harness = finished_harness();
        harness.press(KeyCode::Left);
        harness.press(KeyCode::Char('v'));
        assert!(harness.ui.selection_anchor.is_some());
        for _ in 0..3 {
            harness.press_with(KeyCode::Right, KeyModifiers::SHIFT);
            harness.press_with(KeyCode::Up, KeyModifiers::SHIFT);
        }
        harness.press(KeyCode::Char('v'));
        assert!(harness.ui.selection_anchor.is_none());
        let zoomed = |harness: &Harness| {
            harness
                .session
                .view_state()
                .is_some_and(|state| state.is_zoomed(ChartView::PrimaryCurve))
        };
        assert!(zoomed(&harness));

        harness.press(KeyCode::Char('r'));
        assert!(!zoomed(&harness));
    }

    #[test]
    fn escape_cancels_selection_before_hiding_cursor() {
        let mut harness = finished_harness();
        harness.press(KeyCode::Char('v'));
        assert!(harness.ui.selection_anchor.is_some());
        harness.press(KeyCode::Esc);
        assert!(harness.ui.selection_anchor.is_none());
        assert!(harness.ui.chart_cursor.is_some());
        harness.press(KeyCode::Esc);
        assert!(harness.ui.chart_cursor.is_none());
    }

    #[test]
    fn legend_keys_toggle_series_and_bands() {
        let mut harness = finished_harness();
        harness.press(KeyCode::Char(' '));
        assert!(!harness.session.legend()[0].enabled);
        harness.press(KeyCode::Char(' '));
        assert!(harness.session.legend()[0].enabled);

        harness.press(KeyCode::Char('c'));
        assert_eq!(
            harness.session.status_line(),
            Some("selected series has no confidence band")
        );

        harness.press(KeyCode::Char(']'));
        harness.press(KeyCode::Char('c'));
        let entries = harness.session.legend();
        assert!(entries[0].enabled);
        assert!(!entries[1].enabled);
        assert!(!entries[2].enabled);
    }

    #[test]
    fn help_swallows_next_key_and_q_quits() {
        let mut harness = finished_harness();
        assert!(!harness.press(KeyCode::Char('?')));
        assert!(harness.ui.help_visible);
        assert_eq!(status_text(&harness.session, &harness.ui), "");
        assert!(!harness.press(KeyCode::Char('q')));
        assert!(!harness.ui.help_visible);
        assert!(harness.press(KeyCode::Char('q')));
        assert!(harness.press_with(KeyCode::Char('c'), KeyModifiers::CONTROL));
    }

    #[test]
    fn stale_clear_status_token_is_ignored() {
        let mut harness = finished_harness();
        harness.press(KeyCode::Char('c'));
        assert!(harness.session.status_line().is_some());

        let stale = harness.ui.status_token - 1;
        harness
            .tx
            .send(InternalEvent::ClearStatus { token: stale })
            .expect("send clear");
        harness.drain();
        assert!(harness.session.status_line().is_some());

        let current = harness.ui.status_token;
        harness
            .tx
            .send(InternalEvent::ClearStatus { token: current })
            .expect("send clear");
        harness.drain();
        assert_eq!(harness.session.status_line(), None);
    }

    #[test]
    fn enter_selects_job_under_cursor() {
        let runtime = TestRuntime {
            statuses: vec![
                status(5, JobStatus::Success, "Done"),
                status(6, JobStatus::Running, "10% completed"),
            ],
            results: FakeResultSource::default()
                .with_payload(JobId::new(5), payload_without_qnet()),
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(&[5, 6], runtime);
        harness.start();

        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char('j'));
        assert_eq!(harness.ui.job_cursor, 1);
        harness.press(KeyCode::Enter);
        assert_eq!(harness.session.selected_job(), Some(JobId::new(6)));
        assert_eq!(harness.session.displayed_job(), Some(JobId::new(5)));
        assert_eq!(
            harness.session.status_line(),
            Some("job 6 has no results yet")
        );
    }

    #[test]
    fn download_failure_is_reported() {
        let runtime = TestRuntime {
            statuses: vec![status(5, JobStatus::Success, "Done")],
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(&[5], runtime);
        harness.start();
        let line = harness.session.status_line().unwrap_or_default();
        assert!(line.contains("server returned 404"), "status was {line:?}");
        assert!(!harness.session.graphs().is_requested(JobId::new(5)));
    }

    #[test]
    fn frame_renders_jobs_views_and_legend() -> Result<()> {
        let mut harness = finished_harness();
        harness.press(KeyCode::Right);

        let mut terminal = Terminal::new(TestBackend::new(140, 40))?;
        terminal.draw(|frame| render(frame, &harness.session, &harness.ui))?;
        let text = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>();

        assert!(text.contains("APD90"));
        assert!(text.contains("*5"));
        assert!(text.contains("SUCCESS"));
        assert!(text.contains("[x]"));
        assert!(text.contains("Conc.:"));
        Ok(())
    }

    #[test]
    fn server_messages_show_until_dismissed() {
        let runtime = TestRuntime {
            statuses: vec![status(7, JobStatus::Success, "Done")],
            results: FakeResultSource::default()
                .with_payload(JobId::new(7), payload_with_notes()),
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(&[7], runtime);
        harness.start();

        let notes = harness.session.notifications();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|note| note.job == JobId::new(7)));
        assert!(notes[0].text.contains("Hill coefficient"));

        harness.press(KeyCode::Char('d'));
        assert!(harness.session.notifications().is_empty());
    }

    #[test]
    fn notification_pane_height_is_capped() {
        assert_eq!(notification_height(0), 0);
        assert_eq!(notification_height(1), 3);
        assert_eq!(notification_height(4), 6);
        assert_eq!(notification_height(65_536), 6);
    }

    #[test]
    fn text_helpers() {
        let failed = ProgressBar {
            value: None,
            state: ProgressState::Failed,
            label: "error".to_owned(),
        };
        assert_eq!(progress_cell_text(Some(&failed)), "failed");
        let running = ProgressBar {
            value: Some(7),
            ..ProgressBar::default()
        };
        assert_eq!(progress_cell_text(Some(&running)), "  7%");
        assert_eq!(progress_cell_text(None), "-");

        let notes = [Notification {
            job: JobId::new(5),
            text: "Hill coefficient clamped".to_owned(),
            received_at: fixture_datetime(),
        }];
        assert_eq!(
            notifications_text(&notes),
            "12:34:56 job 5: Hill coefficient clamped"
        );
        assert!(help_overlay_text().contains("confidence"));

        let harness = finished_harness();
        let lines = legend_lines(&harness.session.legend(), 1);
        assert!(lines[0].starts_with(" [x]"));
        assert!(lines[1].starts_with(">[x]"));
    }
}
