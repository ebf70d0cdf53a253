use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
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
use rusqlite::Connection;
use std::io;

use wmtb::{
    add_transaction, category_totals, confirmation_message, days_until_broke, format_tzs,
    get_recent_transactions, get_user_balance, DaysUntilBroke, Transaction, TransactionParser,
    TransactionType, DEFAULT_HISTORY_LIMIT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    Compose,
}

pub struct App<'a> {
    conn: &'a Connection,
    parser: &'a TransactionParser,
    pub user_id: String,
    pub transactions: Vec<Transaction>,
    pub balance: f64,
    pub state: TableState,
    pub mode: Mode,
    pub input: String,
    pub last_reply: Option<String>,
}

impl<'a> App<'a> {
    pub fn new(conn: &'a Connection, parser: &'a TransactionParser, user_id: &str) -> Result<Self> {
        let mut app = Self {
            conn,
            parser,
            user_id: user_id.to_string(),
            transactions: Vec::new(),
            balance: 0.0,
            state: TableState::default(),
            mode: Mode::Browse,
            input: String::new(),
            last_reply: None,
        };
        app.refresh()?;
        Ok(app)
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.transactions = get_recent_transactions(self.conn, &self.user_id, DEFAULT_HISTORY_LIMIT)?;
        self.balance = get_user_balance(self.conn, &self.user_id)?;

        if self.transactions.is_empty() {
            self.state.select(None);
        } else if self.state.selected().is_none() {
            self.state.select(Some(0));
        }
        Ok(())
    }

    /// Parse the typed message, store it, and show the confirmation
    pub fn submit(&mut self) -> Result<()> {
        let text = self.input.trim().to_string();
        self.input.clear();
        self.mode = Mode::Browse;

        if text.is_empty() {
            return Ok(());
        }

        let parsed = self.parser.parse(&text);
        add_transaction(self.conn, &self.user_id, &parsed)?;
        self.last_reply = Some(confirmation_message(&parsed));

        self.state.select(Some(0));
        self.refresh()
    }

    pub fn runway(&self) -> DaysUntilBroke {
        days_until_broke(self.balance, &self.transactions)
    }

    pub fn next(&mut self) {
        let len = self.transactions.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.transactions.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
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

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.mode {
            Mode::Compose => match key.code {
                KeyCode::Esc => {
                    app.input.clear();
                    app.mode = Mode::Browse;
                }
                KeyCode::Enter => app.submit()?,
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Char(c) => app.input.push(c),
                _ => {}
            },
            Mode::Browse => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('i') | KeyCode::Char('/') => app.mode = Mode::Compose,
                KeyCode::Char('r') => app.refresh()?,
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => {
                    if !app.transactions.is_empty() {
                        app.state.select(Some(0));
                    }
                }
                _ => {}
            },
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Balance header
            Constraint::Min(0),    // Ledger + categories
            Constraint::Length(3), // Message input
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(chunks[1]);

    render_table(f, content_chunks[0], app);
    render_categories(f, content_chunks[1], app);
    render_input(f, chunks[2], app);
    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let balance_color = if app.balance < 0.0 { Color::Red } else { Color::Green };

    let spans = vec![
        Span::styled(
            "WMTB Ledger",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(format!("User: {}", app.user_id), Style::default().fg(Color::White)),
        Span::raw("  |  "),
        Span::styled(
            format!("Balance: {}", format_tzs(app.balance)),
            Style::default().fg(balance_color).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("⏳ Days until broke: {}", app.runway()),
            Style::default().fg(Color::Cyan),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Time", "Description", "Amount", "Type", "Category"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.transactions.iter().map(|tx| {
        let color = match tx.transaction_type {
            TransactionType::Income => Color::Green,
            TransactionType::Expense => Color::Red,
            TransactionType::Transfer => Color::Cyan,
        };

        let cells = vec![
            Cell::from(tx.created_at.format("%m-%d %H:%M").to_string()),
            Cell::from(truncate(&tx.description, 30)),
            Cell::from(format_tzs(tx.amount)).style(Style::default().fg(color)),
            Cell::from(tx.transaction_type.as_str()).style(Style::default().fg(color)),
            Cell::from(tx.category.title()),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(32),
            Constraint::Length(16),
            Constraint::Length(9),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Transactions "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_categories(f: &mut Frame, area: Rect, app: &App) {
    let totals = category_totals(&app.transactions);

    let lines: Vec<Line> = if totals.is_empty() {
        vec![Line::from(Span::styled(
            "  No spending yet",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))]
    } else {
        totals
            .into_iter()
            .map(|(category, total)| {
                Line::from(vec![
                    Span::styled(format!("  {:<10}", category.title()), Style::default().fg(Color::Cyan)),
                    Span::raw(format_tzs(total)),
                ])
            })
            .collect()
    };

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Spending "),
    );

    f.render_widget(panel, area);
}

fn render_input(f: &mut Frame, area: Rect, app: &App) {
    let (text, style, border) = match app.mode {
        Mode::Compose => (
            format!("{}█", app.input),
            Style::default().fg(Color::White),
            Color::Yellow,
        ),
        Mode::Browse => (
            "lunch 15000, mpesa received 50000...".to_string(),
            Style::default().fg(Color::DarkGray),
            Color::White,
        ),
    };

    let input = Paragraph::new(Line::from(Span::styled(text, style))).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" Message "),
    );

    f.render_widget(input, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = Vec::new();

    if let Some(reply) = &app.last_reply {
        status_spans.push(Span::styled(format!(" {} ", reply), Style::default().fg(Color::Green)));
        status_spans.push(Span::raw(" | "));
    }

    match app.mode {
        Mode::Compose => {
            status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
            status_spans.push(Span::raw(" Save | "));
            status_spans.push(Span::styled("Esc", Style::default().fg(Color::Yellow)));
            status_spans.push(Span::raw(" Cancel"));
        }
        Mode::Browse => {
            status_spans.push(Span::styled("i", Style::default().fg(Color::Yellow)));
            status_spans.push(Span::raw(" New message | "));
            status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
            status_spans.push(Span::raw(" Nav | "));
            status_spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
            status_spans.push(Span::raw(" Refresh | "));
            status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
            status_spans.push(Span::raw(" Quit"));
        }
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
