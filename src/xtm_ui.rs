// Terminal front end: key mapping, drawing and the interactive run loop
// The screen lives behind a mutex shared with the clock thread so redraws never interleave

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, execute, terminal};
use rand::Rng;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Span, Spans, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::xtm_board::TileView;
use crate::xtm_clock::{Clock, TICK_PERIOD};
use crate::xtm_color::{Depth, Palette};
use crate::xtm_config::Config;
use crate::xtm_error::AppError;
use crate::xtm_game::{
    Difficulty, GameSettings, Input, Outcome, Session, SharedOutcome, Transition, qualifies,
};
use crate::xtm_scores::{FileScoreStore, MAX_NAME_LEN, ScoreStore, clean_name};

const FOOTER: &str = "Restart-(r)    Quit-(q)    Flag-(f)    Click-(Enter)";
const PLAY_AGAIN: &str = "Press (r) to play again or (q) to quit";
const SAVED: &str = "Your score has been saved";

/// Delays used by the run loop
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub tick: Duration,        // Clock period
    pub poll: Duration,        // Input poll timeout
    pub loss_pause: Duration,  // Time the exploded board stays up
    pub saved_pause: Duration, // Time the "score saved" notice stays up
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            tick: TICK_PERIOD,
            poll: Duration::from_millis(200),
            loss_pause: Duration::from_millis(750),
            saved_pause: Duration::from_secs(2),
        }
    }
}

/// Source of key presses, polled with a timeout
pub trait EventSource {
    /// Next key press, or None if the timeout passed without one
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>>;
}

/// Key presses read from the real terminal
pub struct TerminalEvents;

impl EventSource for TerminalEvents {
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(key));
                }
            }
        }
        Ok(None)
    }
}

/// Translate a key press into a game input; unknown keys become NoOp
pub fn map_key(key: KeyEvent) -> Input {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match (key.code, ctrl) {
        (KeyCode::Up, _) | (KeyCode::Char('k'), false) => Input::MoveUp,
        (KeyCode::Down, _) | (KeyCode::Char('j'), false) => Input::MoveDown,
        (KeyCode::Left, _) | (KeyCode::Char('h'), false) => Input::MoveLeft,
        (KeyCode::Right, _) | (KeyCode::Char('l'), false) => Input::MoveRight,
        // Ctrl+J arrives as a line feed on some terminals
        (KeyCode::Enter, _) | (KeyCode::Char(' '), false) | (KeyCode::Char('j'), true) => Input::Click,
        (KeyCode::Char('f' | 'F'), _) => Input::ToggleFlag,
        (KeyCode::Char('q' | 'Q'), _) | (KeyCode::Esc, _) => Input::Quit,
        (KeyCode::Char('r' | 'R'), _) => Input::Restart,
        _ => Input::NoOp,
    }
}

/// Snapshot of everything the board screen shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub label: &'static str,
    pub mines_remaining: i64,
    pub elapsed: u64,
    pub tiles: Vec<Vec<TileView>>,
    pub cursor: (usize, usize),
    pub outcome: Outcome,
}

impl SessionView {
    pub fn capture(session: &Session, elapsed: u64) -> Self {
        SessionView {
            label: session.difficulty().label(),
            mines_remaining: session.mines_remaining(),
            elapsed,
            tiles: session.view(),
            cursor: session.cursor(),
            outcome: session.outcome(),
        }
    }
}

/// HUD status line, time shown as M:SS
pub fn hud_text(label: &str, mines_remaining: i64, elapsed: u64) -> String {
    format!(
        "Difficulty: {}    Mines Remaining: {}    Time: {}:{:02}",
        label,
        mines_remaining,
        elapsed / 60,
        elapsed % 60
    )
}

#[derive(Debug, Clone, Copy)]
struct Glyphs {
    hidden: &'static str,
    flag: &'static str,
    mine: &'static str,
    empty: &'static str,
}

impl Glyphs {
    fn new(ascii: bool) -> Self {
        if ascii {
            Glyphs { hidden: "-", flag: "F", mine: "X", empty: "0" }
        } else {
            Glyphs { hidden: "■", flag: "⚑", mine: "☼", empty: " " }
        }
    }
}

enum Scene {
    Board,
    Message {
        title: String,
        lines: Vec<String>,
        color: Color,
    },
    NamePrompt {
        score: i64,
        name: String,
    },
}

/// The terminal surface and what is currently on it
pub struct Screen<B: Backend> {
    terminal: Terminal<B>,
    palette: Palette,
    glyphs: Glyphs,
    view: Option<SessionView>,
    scene: Scene,
}

/// Render lock shared by the input loop and the clock thread
pub type SharedScreen<B> = Arc<Mutex<Screen<B>>>;

fn lock<B: Backend>(screen: &SharedScreen<B>) -> MutexGuard<'_, Screen<B>> {
    screen.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: Backend> Screen<B> {
    pub fn new(terminal: Terminal<B>, palette: Palette, ascii_icons: bool) -> Self {
        Screen {
            terminal,
            palette,
            glyphs: Glyphs::new(ascii_icons),
            view: None,
            scene: Scene::Board,
        }
    }

    pub fn shared(self) -> SharedScreen<B> {
        Arc::new(Mutex::new(self))
    }

    /// Show a fresh view of the board
    pub fn show_session(&mut self, view: SessionView) -> io::Result<()> {
        self.view = Some(view);
        self.scene = Scene::Board;
        self.draw()
    }

    /// Clock redraw: same board, new time
    pub fn tick(&mut self, elapsed: u64) -> io::Result<()> {
        let Some(view) = self.view.as_mut() else {
            return Ok(());
        };
        view.elapsed = elapsed;
        if matches!(self.scene, Scene::Board) {
            self.draw()?;
        }
        Ok(())
    }

    fn show_message(&mut self, title: &str, lines: Vec<String>, color: Color) -> io::Result<()> {
        self.scene = Scene::Message {
            title: title.to_string(),
            lines,
            color,
        };
        self.draw()
    }

    fn show_prompt(&mut self, score: i64, name: &str) -> io::Result<()> {
        self.scene = Scene::NamePrompt {
            score,
            name: name.to_string(),
        };
        self.draw()
    }

    fn draw(&mut self) -> io::Result<()> {
        let Screen {
            terminal,
            palette,
            glyphs,
            view,
            scene,
        } = self;
        terminal.draw(|f| match scene {
            Scene::Board => {
                if let Some(view) = view {
                    draw_board(f, view, palette, glyphs);
                }
            }
            Scene::Message { title, lines, color } => draw_message(f, title, lines, *color),
            Scene::NamePrompt { score, name } => draw_prompt(f, *score, name),
        })?;
        Ok(())
    }
}

fn center_rect(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    let x = r.x + (r.width - width) / 2;
    let y = r.y + (r.height - height) / 2;
    Rect::new(x, y, width, height)
}

fn draw_board<B: Backend>(f: &mut Frame<B>, view: &SessionView, palette: &Palette, glyphs: &Glyphs) {
    let size = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(3), Constraint::Length(1)].as_ref())
        .split(size);

    let title_style = Style::default().fg(palette.title).add_modifier(Modifier::BOLD);
    let hud = Paragraph::new(Text::from(vec![
        Spans::from(Span::styled("MINESWEEPER", title_style)),
        Spans::from(Span::raw("")),
        Spans::from(Span::raw(hud_text(view.label, view.mines_remaining, view.elapsed))),
    ]))
    .block(Block::default().borders(Borders::ALL))
    .alignment(Alignment::Center);
    f.render_widget(hud, chunks[0]);

    let rows = view.tiles.len();
    let cols = view.tiles.first().map_or(0, Vec::len);
    let mut lines = Vec::with_capacity(rows);
    for (r, row) in view.tiles.iter().enumerate() {
        let mut spans = Vec::with_capacity(cols * 2 + 1);
        for (c, tile) in row.iter().enumerate() {
            let (s, mut style) = match *tile {
                TileView::Hidden => (glyphs.hidden.to_string(), Style::default().fg(palette.hidden)),
                TileView::Flagged => (glyphs.flag.to_string(), Style::default().fg(palette.flag)),
                TileView::RevealedMine => (
                    glyphs.mine.to_string(),
                    Style::default().fg(palette.mine).add_modifier(Modifier::BOLD),
                ),
                TileView::Revealed(0) => (glyphs.empty.to_string(), Style::default()),
                TileView::Revealed(n) => {
                    let color = palette.numbers[(n as usize - 1).min(7)];
                    (n.to_string(), Style::default().fg(color))
                }
            };
            if view.cursor == (r, c) && view.outcome == Outcome::Playing {
                style = style.bg(palette.cursor_bg);
            }
            spans.push(Span::raw(" "));
            spans.push(Span::styled(s, style));
        }
        lines.push(Spans::from(spans));
    }
    let board_area = center_rect((cols * 2 + 3) as u16, (rows + 2) as u16, chunks[1]);
    let board = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(view.label)
            .title_alignment(Alignment::Center),
    );
    f.render_widget(board, board_area);

    let footer = Paragraph::new(Spans::from(Span::raw(FOOTER))).alignment(Alignment::Center);
    f.render_widget(footer, chunks[2]);
}

fn draw_message<B: Backend>(f: &mut Frame<B>, title: &str, lines: &[String], color: Color) {
    let size = f.size();
    let area = center_rect(56, lines.len() as u16 + 4, size);
    let mut text = vec![Spans::from(Span::raw(""))];
    for (i, line) in lines.iter().enumerate() {
        let style = if i == 0 {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        text.push(Spans::from(Span::styled(line.clone(), style)));
    }
    let p = Paragraph::new(Text::from(text))
        .block(Block::default().borders(Borders::ALL).title(title))
        .alignment(Alignment::Center);
    f.render_widget(Clear, size);
    f.render_widget(p, area);
}

fn draw_prompt<B: Backend>(f: &mut Frame<B>, score: i64, name: &str) {
    let size = f.size();
    let area = center_rect(56, 7, size);
    let text = vec![
        Spans::from(Span::raw("")),
        Spans::from(Span::raw(format!("New high score: {score}"))),
        Spans::from(Span::raw("")),
        Spans::from(vec![
            Span::raw("Please enter name: "),
            Span::styled(format!("{name}_"), Style::default().add_modifier(Modifier::BOLD)),
        ]),
    ];
    let p = Paragraph::new(Text::from(text))
        .block(Block::default().borders(Borders::ALL).title("High Score"))
        .alignment(Alignment::Center);
    f.render_widget(Clear, size);
    f.render_widget(p, area);
}

/// Restores the terminal when the game exits, even on error paths
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), terminal::LeaveAlternateScreen, cursor::Show);
    }
}

/// Play in the real terminal until the player quits
pub fn run(cfg: &Config, difficulty: Difficulty) -> Result<(), AppError> {
    // Bad geometry is fatal before the terminal is touched
    let settings = GameSettings::new(cfg.rows, cfg.cols, difficulty)?;
    let mut store = FileScoreStore::open_default().unwrap_or_else(|e| {
        warn!("{e}, keeping scores in the working directory");
        FileScoreStore::at("scores.toml")
    });

    let _guard = TerminalGuard::enter()?;
    let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    let screen = Screen::new(terminal, Palette::new(Depth::detect()), cfg.ascii_icons).shared();
    play(
        screen,
        settings,
        &mut TerminalEvents,
        &mut store,
        &mut rand::thread_rng(),
        Timing::default(),
    )
}

/// Run games back to back on `screen` until the player quits
///
/// Starts the clock once for the whole run and stops it (joining both of its
/// threads) before returning.
pub fn play<B, E, S, R>(
    screen: SharedScreen<B>,
    settings: GameSettings,
    events: &mut E,
    store: &mut S,
    rng: &mut R,
    timing: Timing,
) -> Result<(), AppError>
where
    B: Backend + Send + 'static,
    E: EventSource,
    S: ScoreStore,
    R: Rng + ?Sized,
{
    let outcome = SharedOutcome::new();
    let mut session = Session::new(settings, outcome.clone(), rng)?;

    let tick_screen = Arc::clone(&screen);
    let mut clock = Clock::start_with_period(timing.tick, outcome, move |secs| {
        if let Err(e) = lock(&tick_screen).tick(secs) {
            warn!("clock redraw failed: {e}");
        }
    })?;

    let result = run_sessions(&screen, &mut session, &clock, events, store, rng, timing);
    clock.shutdown()?;
    result
}

fn publish<B: Backend>(screen: &SharedScreen<B>, session: &Session, elapsed: u64) -> io::Result<()> {
    let view = SessionView::capture(session, elapsed);
    lock(screen).show_session(view)
}

fn run_sessions<B, E, S, R>(
    screen: &SharedScreen<B>,
    session: &mut Session,
    clock: &Clock,
    events: &mut E,
    store: &mut S,
    rng: &mut R,
    timing: Timing,
) -> Result<(), AppError>
where
    B: Backend,
    E: EventSource,
    S: ScoreStore,
    R: Rng + ?Sized,
{
    loop {
        publish(screen, session, clock.elapsed())?;
        let next = loop {
            let input = events.next_key(timing.poll)?.map_or(Input::NoOp, map_key);
            if let Some(next) = NextStep::from_transition(session.handle(input)) {
                break next;
            }
            if session.outcome().is_over() {
                let elapsed = clock.settled_elapsed();
                break end_of_game(screen, session, elapsed, events, store, timing)?;
            }
            if input != Input::NoOp {
                publish(screen, session, clock.elapsed())?;
            }
        };
        match next {
            NextStep::Quit => {
                info!("player quit");
                return Ok(());
            }
            NextStep::PlayAgain => {
                // Outcome is still over here, so no tick can count before the new game
                clock.reset();
                session.restart(rng)?;
            }
        }
    }
}

/// What the run loop does once a session stops taking moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    PlayAgain,
    Quit,
}

impl NextStep {
    fn from_transition(transition: Transition) -> Option<Self> {
        match transition {
            Transition::Continue => None,
            Transition::Restart => Some(NextStep::PlayAgain),
            Transition::Quit => Some(NextStep::Quit),
        }
    }
}

/// Post-game flow: result screen, optional high score entry, then restart or quit
fn end_of_game<B, E, S>(
    screen: &SharedScreen<B>,
    session: &mut Session,
    elapsed: u64,
    events: &mut E,
    store: &mut S,
    timing: Timing,
) -> io::Result<NextStep>
where
    B: Backend,
    E: EventSource,
    S: ScoreStore,
{
    publish(screen, session, elapsed)?;
    let (won_color, lost_color) = {
        let s = lock(screen);
        (s.palette.won, s.palette.lost)
    };

    if session.outcome() == Outcome::Lost {
        thread::sleep(timing.loss_pause);
        lock(screen).show_message("Failure", vec!["Game Over".to_string(), String::new(), PLAY_AGAIN.to_string()], lost_color)?;
    } else {
        let score = session.score(elapsed);
        info!(score, elapsed, "game won");
        let mut lines = vec!["You Won!".to_string(), format!("Your score was {score}")];
        lock(screen).show_message("Victory", lines.clone(), won_color)?;
        if let Some(status) = offer_high_score(screen, events, store, score, won_color, timing)? {
            lines.push(status);
        }
        lines.push(String::new());
        lines.push(PLAY_AGAIN.to_string());
        lock(screen).show_message("Victory", lines, won_color)?;
    }

    loop {
        if let Some(key) = events.next_key(timing.poll)? {
            if let Some(next) = NextStep::from_transition(session.handle(map_key(key))) {
                return Ok(next);
            }
        }
    }
}

/// Ask for a name if the score makes the table; returns a status line to show
fn offer_high_score<B, E, S>(
    screen: &SharedScreen<B>,
    events: &mut E,
    store: &mut S,
    score: i64,
    color: Color,
    timing: Timing,
) -> io::Result<Option<String>>
where
    B: Backend,
    E: EventSource,
    S: ScoreStore,
{
    let top = match store.top_scores() {
        Ok(top) => top,
        Err(e) => {
            error!("cannot read high scores: {e}");
            return Ok(Some(format!("High scores unavailable: {e}")));
        }
    };
    if !qualifies(&top, score) {
        return Ok(None);
    }
    let Some(name) = read_name(screen, events, score, timing)? else {
        return Ok(None);
    };
    match store.record_score(&name, score) {
        Ok(()) => {
            info!(name = %name, score, "high score saved");
            lock(screen).show_message("High Score", vec![SAVED.to_string()], color)?;
            thread::sleep(timing.saved_pause);
            Ok(Some(SAVED.to_string()))
        }
        Err(e) => {
            error!("cannot save score: {e}");
            Ok(Some(format!("Score not saved: {e}")))
        }
    }
}

/// Line editor for the high score name; Esc or an empty name skips saving
fn read_name<B, E>(
    screen: &SharedScreen<B>,
    events: &mut E,
    score: i64,
    timing: Timing,
) -> io::Result<Option<String>>
where
    B: Backend,
    E: EventSource,
{
    let mut name = String::new();
    loop {
        lock(screen).show_prompt(score, &name)?;
        let Some(key) = events.next_key(timing.poll)? else {
            continue;
        };
        match key.code {
            KeyCode::Enter => return Ok(clean_name(&name)),
            KeyCode::Esc => return Ok(None),
            KeyCode::Backspace => {
                name.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if name.chars().count() < MAX_NAME_LEN {
                    name.push(c);
                }
            }
            _ => {}
        }
    }
}
