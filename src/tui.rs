use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    text::Line,
    widgets::{Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table},
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::{EXHAUSTED_MESSAGE, INTERNAL_MESSAGE};
use crate::indicators;
use crate::leaderboard::{self, Tab};
use crate::pipeline::Game;
use crate::round::{ChartPoint, Round, RoundError};
use crate::scores::{ScoreBook, Session, Swipe, Verdict, streak_message};
use crate::storage_utils::AsyncStorageManager;
use crate::symbols::display_name;

// --- App State ---

enum Screen {
    NameEntry { input: String },
    Loading,
    Playing,
    Revealed(Verdict),
    Failed(String),
}

struct App {
    screen: Screen,
    round: Option<Round>,
    rsi: Option<f64>,
    session: Session,
    book: ScoreBook,
    show_leaderboard: bool,
    tab: Tab,
    rsi_period: u32,
}

impl App {
    fn new(book: ScoreBook, rsi_period: u32) -> Self {
        let screen = if book.player_name.is_some() {
            Screen::Loading
        } else {
            Screen::NameEntry {
                input: String::new(),
            }
        };
        Self {
            screen,
            round: None,
            rsi: None,
            session: Session::default(),
            book,
            show_leaderboard: false,
            tab: Tab::default(),
            rsi_period,
        }
    }

    fn set_round(&mut self, result: Result<Round>) {
        match result {
            Ok(round) => {
                self.rsi = indicators::calculate_rsi(&round.visible_data, self.rsi_period);
                self.round = Some(round);
                self.screen = Screen::Playing;
            }
            Err(e) => {
                let message = match e.downcast_ref::<RoundError>() {
                    Some(RoundError::Exhausted { .. }) => EXHAUSTED_MESSAGE,
                    _ => INTERNAL_MESSAGE,
                };
                warn!("round request failed: {:#}", e);
                self.round = None;
                self.screen = Screen::Failed(message.to_string());
            }
        }
    }

    /// Grades the swipe; a wrong answer closes the run and records it.
    fn answer(&mut self, swipe: Swipe) -> Option<Verdict> {
        let actual = self.round.as_ref()?.outcome;
        let verdict = self.session.answer(swipe, actual);
        if let Verdict::Wrong { lost_streak, score } = verdict {
            self.book.record_run(lost_streak, score, Utc::now());
        }
        self.screen = Screen::Revealed(verdict);
        Some(verdict)
    }
}

enum Action {
    None,
    Quit,
    FetchRound,
    SaveBook,
    /// Name just entered: persist it and start the first round.
    Welcome,
}

// --- TUI ---

pub async fn run_tui(game: Arc<Game>, storage: AsyncStorageManager) -> Result<()> {
    let book = ScoreBook::load(&storage).await?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, game, &storage, book).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

fn request_round(game: &Arc<Game>, tx: &mpsc::Sender<Result<Round>>) {
    let game = Arc::clone(game);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = game.next_round().await;
        let _ = tx.send(result).await;
    });
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    game: Arc<Game>,
    storage: &AsyncStorageManager,
    book: ScoreBook,
) -> Result<()> {
    let (round_tx, mut round_rx) = mpsc::channel::<Result<Round>>(1);
    let mut app = App::new(book, game.config.rsi_period);

    if matches!(app.screen, Screen::Loading) {
        request_round(&game, &round_tx);
    }

    loop {
        terminal.draw(|f| ui(f, &app))?;

        if let Ok(result) = round_rx.try_recv() {
            app.set_round(result);
        }

        if event::poll(Duration::from_millis(50))? {
            // Resize needs no handling: the next draw picks up the new size.
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match handle_key_event(key, &mut app) {
                    Action::None => {}
                    Action::Quit => {
                        info!(score = app.session.score, "quitting");
                        return Ok(());
                    }
                    Action::FetchRound => {
                        app.screen = Screen::Loading;
                        request_round(&game, &round_tx);
                    }
                    Action::SaveBook => save_book(&app.book, storage).await,
                    Action::Welcome => {
                        save_book(&app.book, storage).await;
                        app.screen = Screen::Loading;
                        request_round(&game, &round_tx);
                    }
                }
            }
        }
    }
}

async fn save_book(book: &ScoreBook, storage: &AsyncStorageManager) {
    if let Err(e) = book.save(storage).await {
        warn!("could not save scores: {:#}", e);
    }
}

fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    if let Screen::NameEntry { input } = &mut app.screen {
        return match key.code {
            KeyCode::Esc => Action::Quit,
            KeyCode::Backspace => {
                input.pop();
                Action::None
            }
            KeyCode::Char(c) if input.chars().count() < 24 => {
                input.push(c);
                Action::None
            }
            KeyCode::Enter => {
                let name = input.clone();
                if app.book.set_player_name(&name) {
                    app.screen = Screen::Loading;
                    Action::Welcome
                } else {
                    Action::None
                }
            }
            _ => Action::None,
        };
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
        KeyCode::Char('L') | KeyCode::Char('l') => {
            app.show_leaderboard = !app.show_leaderboard;
            return Action::None;
        }
        KeyCode::Tab if app.show_leaderboard => {
            app.tab = app.tab.toggle();
            return Action::None;
        }
        _ => {}
    }

    let playing = matches!(app.screen, Screen::Playing);
    match key.code {
        KeyCode::Left | KeyCode::Char('a') if playing => {
            app.answer(Swipe::Left);
            Action::SaveBook
        }
        KeyCode::Right | KeyCode::Char('d') if playing => {
            app.answer(Swipe::Right);
            Action::SaveBook
        }
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('n')
            if matches!(app.screen, Screen::Revealed(_)) =>
        {
            Action::FetchRound
        }
        KeyCode::Enter | KeyCode::Char('r') if matches!(app.screen, Screen::Failed(_)) => {
            Action::FetchRound
        }
        _ => Action::None,
    }
}

// --- Rendering ---

fn closes(points: &[ChartPoint], offset: usize) -> Vec<(f64, f64)> {
    points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.close.map(|c| ((i + offset) as f64, c)))
        .collect()
}

fn y_bounds(series: &[&[(f64, f64)]]) -> [f64; 2] {
    let (lo, hi) = series
        .iter()
        .flat_map(|s| s.iter().map(|&(_, y)| y))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.01);
    [lo - pad, hi + pad]
}

fn streak_color(streak: u32) -> Color {
    match streak {
        5.. => Color::LightRed,
        3..=4 => Color::Yellow,
        _ => Color::Cyan,
    }
}

fn ui(f: &mut Frame, app: &App) {
    let layout = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .split(f.size());

    render_header(f, app, layout[0]);

    match &app.screen {
        Screen::NameEntry { input } => render_name_entry(f, input, layout[1]),
        Screen::Loading => {
            render_popup(f, layout[1], "Loading", "Finding a setup...\nPlease wait.")
        }
        Screen::Failed(message) => {
            render_popup(f, layout[1], "No round", &format!("{}\n\nPress r to try again.", message))
        }
        Screen::Playing => render_chart(f, app, None, layout[1]),
        Screen::Revealed(verdict) => render_chart(f, app, Some(*verdict), layout[1]),
    }

    let hints = match app.screen {
        Screen::NameEntry { .. } => "Enter confirms | Esc quits",
        Screen::Playing => "← bear | → bull | l leaderboard | q quit",
        Screen::Revealed(_) => "Enter next round | l leaderboard | q quit",
        Screen::Failed(_) => "r retry | l leaderboard | q quit",
        Screen::Loading => "l leaderboard | q quit",
    };
    f.render_widget(
        Paragraph::new(hints)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray)),
        layout[2],
    );

    if app.show_leaderboard {
        render_leaderboard(f, app, centered_rect(70, 80, f.size()));
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let player = app.book.player_name.as_deref().unwrap_or("-");
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let line = Line::from(vec![
        Span::styled("STOCK", bold),
        Span::styled("SWIPE", bold.fg(Color::Green)),
        Span::raw(format!("   Player: {}   Score: {}   ", player, app.session.score)),
        Span::styled(
            format!("Streak: {}", app.session.streak),
            Style::default().fg(streak_color(app.session.streak)),
        ),
    ]);
    f.render_widget(
        Paragraph::new(line)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn render_name_entry(f: &mut Frame, input: &str, area: Rect) {
    let area = centered_rect(50, 30, area);
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(format!("What should we call you?\n\n> {}_", input))
            .alignment(Alignment::Center)
            .block(Block::default().title("Welcome").borders(Borders::ALL)),
        area,
    );
}

fn render_chart(f: &mut Frame, app: &App, verdict: Option<Verdict>, area: Rect) {
    let Some(round) = &app.round else {
        return;
    };

    let visible = closes(&round.visible_data, 0);
    let future = match verdict {
        Some(_) => closes(&round.future_data, round.visible_data.len()),
        None => Vec::new(),
    };
    let revealed = if verdict.is_some() {
        round.future_data.len()
    } else {
        0
    };
    let total = round.visible_data.len() + revealed;
    let [y_lo, y_hi] = y_bounds(&[&visible, &future]);

    let future_color = if round.percent_change > 0.0 {
        Color::Green
    } else {
        Color::Red
    };

    let mut datasets = vec![
        Dataset::default()
            .name("last 60 days")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&visible),
    ];
    if !future.is_empty() {
        datasets.push(
            Dataset::default()
                .name("next 7 days")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(future_color))
                .data(&future),
        );
    }

    let first_date = round.visible_data.first().map_or("", |p| p.time.as_str());
    let last_date = match verdict {
        Some(_) => round.future_data.last(),
        None => round.visible_data.last(),
    }
    .map_or("", |p| p.time.as_str());

    let title = match verdict {
        None => format!(
            " {}  RSI({}): {} ",
            display_name(&round.symbol),
            app.rsi_period,
            app.rsi.map_or("n/a".to_string(), |v| format!("{:.1}", v))
        ),
        Some(verdict) => {
            let sign = if round.percent_change > 0.0 { "+" } else { "" };
            let result = match verdict {
                Verdict::Correct { streak } => format!("Correct! {}", streak_message(streak)),
                Verdict::Wrong { .. } => format!("Wrong, it was {}", round.outcome),
            };
            format!(
                " {}  {}{:.2}% next 7 days  {} ",
                display_name(&round.symbol),
                sign,
                round.percent_change,
                result
            )
        }
    };
    let title_color = match verdict {
        Some(Verdict::Correct { .. }) => Color::Green,
        Some(Verdict::Wrong { .. }) => Color::Red,
        None => Color::White,
    };

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(title, Style::default().fg(title_color))),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, total.saturating_sub(1).max(1) as f64])
                .labels(vec![Span::raw(first_date.to_string()), Span::raw(last_date.to_string())]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([y_lo, y_hi])
                .labels(vec![
                    Span::raw(format!("{:.2}", y_lo)),
                    Span::raw(format!("{:.2}", y_hi)),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_leaderboard(f: &mut Frame, app: &App, area: Rect) {
    f.render_widget(Clear, area);

    let chunks = Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let rows = leaderboard::ranked(app.tab, &app.book);
    let top = rows.first().map_or(1.0, |r| r.value as f64);
    let leader_rows = rows.iter().enumerate().map(|(i, row)| {
        let shade = (255.0 * leaderboard::visibility_ratio(row.value as f64, top)) as u8;
        let name_style = if row.is_player {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Rgb(0, shade, shade))
        };
        Row::new([
            Cell::from(format!("{}", i + 1)).style(Style::default().fg(Color::DarkGray)),
            Cell::from(row.name.clone()).style(name_style),
            Cell::from(row.value.to_string()).style(Style::default().fg(Color::Rgb(0, shade, 0))),
        ])
    });
    f.render_widget(
        Table::new(
            leader_rows,
            [
                Constraint::Length(6),
                Constraint::Percentage(60),
                Constraint::Percentage(30),
            ],
        )
        .header(
            Row::new(["Rank", "Player", app.tab.title()])
                .style(Style::default().bg(Color::DarkGray)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Leaderboard: {} (Tab switches) ", app.tab.title())),
        ),
        chunks[0],
    );

    let recent_rows = app.book.history.iter().take(10).map(|entry| {
        Row::new([
            Cell::from(entry.date.format("%d-%m-%Y %H:%M").to_string())
                .style(Style::default().fg(Color::DarkGray)),
            Cell::from(entry.name.clone()),
            Cell::from(entry.streak.to_string()),
            Cell::from(entry.score.to_string()),
        ])
    });
    f.render_widget(
        Table::new(
            recent_rows,
            [
                Constraint::Length(18),
                Constraint::Percentage(40),
                Constraint::Percentage(20),
                Constraint::Percentage(20),
            ],
        )
        .header(
            Row::new(["Date", "Player", "Streak", "Score"])
                .style(Style::default().bg(Color::DarkGray)),
        )
        .block(Block::default().borders(Borders::ALL).title(" Recent runs ")),
        chunks[1],
    );
}

fn render_popup(f: &mut Frame, area: Rect, title: &str, body: &str) {
    let area = centered_rect(60, 30, area);
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(body.to_string())
            .block(
                Block::default()
                    .title(title.to_string())
                    .borders(Borders::ALL),
            )
            .alignment(Alignment::Center),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
