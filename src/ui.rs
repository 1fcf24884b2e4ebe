// Operator dashboard (TUI)
// Left panel: entry/exit input boxes fed by keyboard or the plate
// scanner. Right panel: live table of open sessions. A completed exit
// pops a receipt window with the payment QR. The dashboard re-reads
// the ledger on every refresh; nothing is cached between operations.

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use crate::capture::{CaptureOutcome, PlateCapture};
use crate::config::PaymentConfig;
use crate::ledger::VehicleLedger;
use crate::qr::render_payment_qr;
use crate::receipt::{payment_uri, receipt_lines};
use crate::service::{OpenRow, ParkError, ParkingService};
use crate::session::normalize_plate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Entry,
    Exit,
}

impl Focus {
    fn toggle(self) -> Self {
        match self {
            Focus::Entry => Focus::Exit,
            Focus::Exit => Focus::Entry,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Focus::Entry => "Vehicle Entry",
            Focus::Exit => "Vehicle Exit",
        }
    }
}

/// Receipt popup content, pre-rendered once at exit time.
struct ReceiptView {
    lines: Vec<String>,
    qr: String,
}

pub struct App<L: VehicleLedger, C: PlateCapture> {
    service: ParkingService<L>,
    capture: C,
    payment: PaymentConfig,

    rows: Vec<OpenRow>,
    table_state: TableState,

    entry_input: String,
    exit_input: String,
    focus: Focus,

    status: String,
    pending_capture: Option<(Focus, Receiver<CaptureOutcome>)>,
    receipt_view: Option<ReceiptView>,
}

impl<L: VehicleLedger, C: PlateCapture> App<L, C> {
    pub fn new(service: ParkingService<L>, capture: C, payment: PaymentConfig) -> Self {
        let mut app = Self {
            service,
            capture,
            payment,
            rows: Vec::new(),
            table_state: TableState::default(),
            entry_input: String::new(),
            exit_input: String::new(),
            focus: Focus::Entry,
            status: "Ready".to_string(),
            pending_capture: None,
            receipt_view: None,
        };
        app.refresh();
        app
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn refresh(&mut self) {
        match self.service.list_open_sessions(Self::now()) {
            Ok(rows) => {
                self.rows = rows;
                if self.rows.is_empty() {
                    self.table_state.select(None);
                } else if self.table_state.selected().is_none() {
                    self.table_state.select(Some(0));
                } else if let Some(i) = self.table_state.selected() {
                    if i >= self.rows.len() {
                        self.table_state.select(Some(self.rows.len() - 1));
                    }
                }
            }
            Err(e) => self.set_status(format!("Dashboard error: {e}")),
        }
    }

    fn focused_input_mut(&mut self) -> &mut String {
        match self.focus {
            Focus::Entry => &mut self.entry_input,
            Focus::Exit => &mut self.exit_input,
        }
    }

    fn submit(&mut self) {
        let raw = self.focused_input_mut().clone();
        let plate = normalize_plate(&raw);
        if plate.is_empty() {
            self.set_status("Please enter a vehicle number.");
            return;
        }

        match self.focus {
            Focus::Entry => match self.service.record_entry(&plate, Self::now()) {
                Ok(_) => {
                    self.entry_input.clear();
                    self.set_status(format!("Entry recorded for {plate}."));
                    self.refresh();
                }
                Err(e) => self.set_status(e.to_string()),
            },
            Focus::Exit => match self.service.process_exit(&plate, Self::now()) {
                Ok(receipt) => {
                    self.exit_input.clear();
                    let uri = payment_uri(&receipt, &self.payment);
                    let qr = render_payment_qr(&uri)
                        .unwrap_or_else(|e| format!("QR unavailable: {e}"));
                    self.receipt_view = Some(ReceiptView {
                        lines: receipt_lines(&receipt),
                        qr,
                    });
                    self.set_status(format!("Exit processed for {plate}."));
                    self.refresh();
                }
                Err(e @ ParkError::RemovalFailed(_)) => {
                    // Fail closed: no receipt, nothing charged
                    self.set_status(e.to_string());
                    self.refresh();
                }
                Err(e) => self.set_status(e.to_string()),
            },
        }
    }

    fn start_capture(&mut self) {
        if self.pending_capture.is_some() {
            self.set_status("A scan is already in progress.");
            return;
        }
        self.set_status("Starting scanner...");
        let rx = self.capture.begin_capture();
        self.pending_capture = Some((self.focus, rx));
    }

    fn abandon_capture(&mut self) {
        // Dropping the receiver discards any late result; the scan
        // never committed anything by itself
        self.pending_capture = None;
        self.set_status("Scan abandoned.");
    }

    fn poll_capture(&mut self) {
        let Some((target, rx)) = self.pending_capture.as_ref() else {
            return;
        };
        let target = *target;

        match rx.try_recv() {
            Ok(outcome) => {
                self.pending_capture = None;
                match outcome {
                    CaptureOutcome::Plate(plate) => {
                        match target {
                            Focus::Entry => self.entry_input = plate.clone(),
                            Focus::Exit => self.exit_input = plate.clone(),
                        }
                        self.set_status(format!("Scanned: {plate}"));
                    }
                    CaptureOutcome::Failed(reason) => {
                        self.set_status(format!("Scan failed: {reason}"));
                    }
                    CaptureOutcome::Cancelled => self.set_status("Scan cancelled."),
                    CaptureOutcome::Unavailable(reason) => self.set_status(reason),
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending_capture = None;
                self.set_status("Scanner stopped without a result.");
            }
        }
    }

    fn copy_selected_to_exit(&mut self) {
        let plate = self
            .table_state
            .selected()
            .and_then(|i| self.rows.get(i))
            .map(|row| row.vehicle_id.clone());

        if let Some(plate) = plate {
            self.exit_input = plate.clone();
            self.focus = Focus::Exit;
            self.set_status(format!("Selected {plate} for exit."));
        }
    }

    fn next_row(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    fn previous_row(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.table_state.select(Some(i));
    }
}

pub fn run_ui<L: VehicleLedger, C: PlateCapture>(app: &mut App<L, C>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend, L: VehicleLedger, C: PlateCapture>(
    terminal: &mut Terminal<B>,
    app: &mut App<L, C>,
) -> Result<()> {
    loop {
        app.poll_capture();
        terminal.draw(|f| ui(f, app))?;

        // Short poll so pending capture results are picked up even
        // when the operator is idle
        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            // Receipt popup swallows keys until dismissed
            if app.receipt_view.is_some() {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                    app.receipt_view = None;
                    app.set_status("Ready");
                }
                continue;
            }

            match key.code {
                KeyCode::Esc => {
                    if app.pending_capture.is_some() {
                        app.abandon_capture();
                    } else {
                        return Ok(());
                    }
                }
                KeyCode::Tab => app.focus = app.focus.toggle(),
                KeyCode::Enter => app.submit(),
                KeyCode::F(2) => app.start_capture(),
                KeyCode::F(3) => app.copy_selected_to_exit(),
                KeyCode::F(5) => {
                    app.refresh();
                    app.set_status("Dashboard refreshed.");
                }
                KeyCode::Backspace => {
                    app.focused_input_mut().pop();
                }
                KeyCode::Down => app.next_row(),
                KeyCode::Up => app.previous_row(),
                KeyCode::Char(c) if c.is_ascii_alphanumeric() || c == ' ' || c == '-' => {
                    let input = app.focused_input_mut();
                    if input.len() < 16 {
                        input.push(c);
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui<L: VehicleLedger, C: PlateCapture>(f: &mut Frame, app: &mut App<L, C>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0]);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40), // Operations panel
            Constraint::Percentage(60), // Dashboard
        ])
        .split(chunks[1]);

    render_operations(f, content[0], app);
    render_dashboard(f, content[1], app);
    render_status(f, chunks[2], app);

    if app.receipt_view.is_some() {
        render_receipt_popup(f, app);
    }
}

fn render_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " Mall Parking System ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" Tab: switch field | Enter: submit | F2: scan | F3: pick row | F5: refresh | Esc: quit"),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_operations<L: VehicleLedger, C: PlateCapture>(
    f: &mut Frame,
    area: Rect,
    app: &App<L, C>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Entry input
            Constraint::Length(3), // Exit input
            Constraint::Min(0),    // Hints
        ])
        .split(area);

    render_input(f, chunks[0], Focus::Entry, &app.entry_input, app.focus);
    render_input(f, chunks[1], Focus::Exit, &app.exit_input, app.focus);

    let scanning = if app.pending_capture.is_some() {
        "Scanner running... (Esc to abandon)"
    } else {
        "F2 scans a plate into the focused field."
    };
    let hints = Paragraph::new(vec![
        Line::from(scanning),
        Line::from("Enter in the Exit field prints the payment receipt."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Operations"));
    f.render_widget(hints, chunks[2]);
}

fn render_input(f: &mut Frame, area: Rect, field: Focus, value: &str, focus: Focus) {
    let focused = field == focus;
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let cursor = if focused { "_" } else { "" };
    let input = Paragraph::new(format!("{value}{cursor}")).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(field.title()),
    );
    f.render_widget(input, area);
}

fn render_dashboard<L: VehicleLedger, C: PlateCapture>(
    f: &mut Frame,
    area: Rect,
    app: &mut App<L, C>,
) {
    let header = Row::new(vec!["Vehicle No", "Entry Time", "Duration"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app
        .rows
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.vehicle_id.clone()),
                Cell::from(row.entry_time.clone()),
                Cell::from(row.parked_for.to_string()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(20),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Live Dashboard - Parked: {}", app.rows.len())),
    )
    .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_status<L: VehicleLedger, C: PlateCapture>(f: &mut Frame, area: Rect, app: &App<L, C>) {
    let status = Paragraph::new(app.status.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, area);
}

fn render_receipt_popup<L: VehicleLedger, C: PlateCapture>(f: &mut Frame, app: &App<L, C>) {
    let Some(view) = &app.receipt_view else {
        return;
    };

    let mut lines: Vec<Line> = view
        .lines
        .iter()
        .map(|l| Line::from(l.clone()))
        .collect();
    lines.push(Line::from(""));
    for qr_line in view.qr.lines() {
        lines.push(Line::from(qr_line.to_string()));
    }
    lines.push(Line::from(""));
    lines.push(Line::from("Press Enter to close"));

    let height = (lines.len() as u16 + 2).min(f.size().height.saturating_sub(2));
    let area = centered_rect(48, height, f.size());

    f.render_widget(Clear, area);
    let popup = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Payment Receipt"),
        );
    f.render_widget(popup, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
