// Error types shared across the game
// Configuration problems are fatal, score store problems are only reported

use std::io;
use thiserror::Error;

/// Invalid board setup, detected before any session exists
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("board must have at least one row and one column")]
    EmptyBoard,
    #[error("{mines} mines do not fit on a board of {tiles} tiles")]
    TooManyMines { mines: usize, tiles: usize },
}

/// Failures of the background clock threads
#[derive(Error, Debug)]
pub enum ClockError {
    #[error("failed to start clock thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("clock thread panicked")]
    Join,
}

/// Failures reading or writing the high score table
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("no data directory available for the score table")]
    NoDataDir,
    #[error("score table I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("score table is malformed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode score table: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors that end the interactive game
#[derive(Error, Debug)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Clock(#[from] ClockError),
}
