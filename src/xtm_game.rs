// Game session and win/loss state machine
// Handles difficulty presets, input dispatch, outcome tracking and scoring

use rand::Rng;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::xtm_board::{Board, TileView};
use crate::xtm_error::GameError;
use crate::xtm_scores::ScoreEntry;

/// Size of the high score table
pub const MAX_SCORES: usize = 10;

/// Difficulty presets selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,   // 5 mines
    Normal, // 15 mines
    Hard,   // 25 mines
}

impl Difficulty {
    pub fn mines(self) -> usize {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Normal => 15,
            Difficulty::Hard => 25,
        }
    }

    /// Score awarded for an instant win; every elapsed second costs one point
    pub fn baseline(self) -> i64 {
        match self {
            Difficulty::Easy => 250,
            Difficulty::Normal => 500,
            Difficulty::Hard => 1000,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }
}

/// Validated board geometry and difficulty for every session of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    pub rows: usize,
    pub cols: usize,
    pub difficulty: Difficulty,
}

impl GameSettings {
    pub fn new(rows: usize, cols: usize, difficulty: Difficulty) -> Result<Self, GameError> {
        if rows == 0 || cols == 0 {
            return Err(GameError::EmptyBoard);
        }
        let tiles = rows * cols;
        if difficulty.mines() >= tiles {
            return Err(GameError::TooManyMines {
                mines: difficulty.mines(),
                tiles,
            });
        }
        Ok(GameSettings {
            rows,
            cols,
            difficulty,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Playing,
    Won,
    Lost,
}

impl Outcome {
    pub fn is_over(self) -> bool {
        self != Outcome::Playing
    }
}

/// Outcome of the current session, read by the clock thread as well
///
/// Every access locks only for the copy in or out, so holders never
/// block on anything else while the guard is alive.
#[derive(Debug, Clone, Default)]
pub struct SharedOutcome(Arc<Mutex<Outcome>>);

impl SharedOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Outcome {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move a running game to its final outcome
    /// Returns false if the game had already ended
    pub fn finish(&self, outcome: Outcome) -> bool {
        let mut current = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_over() || !outcome.is_over() {
            return false;
        }
        *current = outcome;
        true
    }

    fn restart(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Outcome::Playing;
    }
}

/// Discrete player input produced by the terminal layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Click,
    ToggleFlag,
    Quit,
    Restart,
    NoOp,
}

/// What the run loop should do after an input was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue,
    Restart,
    Quit,
}

/// One play session: the board plus everything the player changes on it
pub struct Session {
    settings: GameSettings,
    board: Board,
    cursor: (usize, usize),  // (row, col), always in bounds
    mines_remaining: i64,    // Mine count minus flags, negative when over-flagged
    correctly_flagged: usize,
    outcome: SharedOutcome,
}

impl Session {
    /// Start a fresh game with newly placed mines
    pub fn new<R: Rng + ?Sized>(
        settings: GameSettings,
        outcome: SharedOutcome,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let mut session = Session {
            settings,
            board: Board::new(settings.rows, settings.cols),
            cursor: (0, 0),
            mines_remaining: 0,
            correctly_flagged: 0,
            outcome,
        };
        session.restart(rng)?;
        Ok(session)
    }

    /// Throw away the current game and deal a new board
    pub fn restart<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), GameError> {
        self.board.clear();
        self.board.place_mines(self.settings.difficulty.mines(), rng)?;
        self.board.compute_adjacency();
        self.cursor = (0, 0);
        self.mines_remaining = self.board.mine_count() as i64;
        self.correctly_flagged = 0;
        self.outcome.restart();
        info!(
            difficulty = self.settings.difficulty.label(),
            rows = self.settings.rows,
            cols = self.settings.cols,
            mines = self.board.mine_count(),
            "new game"
        );
        Ok(())
    }

    #[cfg(test)]
    pub fn from_board(board: Board, difficulty: Difficulty, outcome: SharedOutcome) -> Self {
        outcome.restart();
        Session {
            settings: GameSettings {
                rows: board.rows(),
                cols: board.cols(),
                difficulty,
            },
            mines_remaining: board.mine_count() as i64,
            board,
            cursor: (0, 0),
            correctly_flagged: 0,
            outcome,
        }
    }

    /// Apply one input event and report how the run loop should proceed
    pub fn handle(&mut self, input: Input) -> Transition {
        match input {
            Input::Quit => return Transition::Quit,
            Input::Restart if self.outcome().is_over() => return Transition::Restart,
            _ => {}
        }
        if self.outcome().is_over() {
            return Transition::Continue;
        }
        match input {
            Input::MoveUp => self.step_cursor(-1, 0),
            Input::MoveDown => self.step_cursor(1, 0),
            Input::MoveLeft => self.step_cursor(0, -1),
            Input::MoveRight => self.step_cursor(0, 1),
            Input::Click => self.click(),
            Input::ToggleFlag => self.toggle_flag(),
            Input::Restart | Input::Quit | Input::NoOp => {}
        }
        Transition::Continue
    }

    /// Move the cursor one step, clamped to the board
    pub fn step_cursor(&mut self, drow: isize, dcol: isize) {
        let max_row = (self.board.rows() - 1) as isize;
        let max_col = (self.board.cols() - 1) as isize;
        let row = (self.cursor.0 as isize + drow).clamp(0, max_row) as usize;
        let col = (self.cursor.1 as isize + dcol).clamp(0, max_col) as usize;
        self.cursor = (row, col);
    }

    /// Reveal the tile under the cursor and check for a lost game
    pub fn click(&mut self) {
        let (row, col) = self.cursor;
        let opened = self.board.reveal(row, col);
        debug!(row, col, opened, "click");
        if self.board.exploded() && self.outcome.finish(Outcome::Lost) {
            info!(row, col, "mine hit, game lost");
        }
    }

    /// Flag or unflag the tile under the cursor
    ///
    /// The game is won as soon as the number of correctly flagged mines equals
    /// the mine count; extra flags on safe tiles only lower the counter.
    pub fn toggle_flag(&mut self) {
        let (row, col) = self.cursor;
        let Some(flagged) = self.board.toggle_flag(row, col) else {
            return;
        };
        let mine = self.board.tile(row, col).mine;
        if flagged {
            self.mines_remaining -= 1;
            if mine {
                self.correctly_flagged += 1;
            }
        } else {
            self.mines_remaining += 1;
            if mine {
                self.correctly_flagged -= 1;
            }
        }
        if self.correctly_flagged == self.board.mine_count() && self.outcome.finish(Outcome::Won) {
            info!(flags = self.correctly_flagged, "all mines flagged, game won");
        }
    }

    /// Final score for a win after `elapsed` seconds; not floored at zero
    pub fn score(&self, elapsed: u64) -> i64 {
        self.settings.difficulty.baseline() - elapsed as i64
    }

    /// Player-visible grid; after a loss every unflagged mine is shown
    pub fn view(&self) -> Vec<Vec<TileView>> {
        let lost = self.outcome() == Outcome::Lost;
        (0..self.board.rows())
            .map(|row| {
                (0..self.board.cols())
                    .map(|col| {
                        let tile = self.board.tile(row, col);
                        if lost && tile.mine && !tile.flagged {
                            TileView::RevealedMine
                        } else {
                            self.board.view(row, col)
                        }
                    })
                    .collect()
            })
            .collect()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    pub fn mines_remaining(&self) -> i64 {
        self.mines_remaining
    }

    pub fn correctly_flagged(&self) -> usize {
        self.correctly_flagged
    }

    pub fn difficulty(&self) -> Difficulty {
        self.settings.difficulty
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome.get()
    }
}

/// Whether a winning score earns a place in the high score table
pub fn qualifies(entries: &[ScoreEntry], score: i64) -> bool {
    entries.len() < MAX_SCORES
        || entries
            .iter()
            .map(|e| e.score)
            .min()
            .is_some_and(|lowest| score >= lowest)
}
