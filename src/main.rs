// Entry point for the xtmines terminal Minesweeper
// Parses the mode flag, loads configuration, sets up file logging and dispatches

use clap::{ArgAction, ArgGroup, Parser};
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod xtm_board;  // Board model and reveal engine
mod xtm_clock;  // Tick source and game clock
mod xtm_color;  // Terminal color capability matching
mod xtm_config; // User configuration and platform paths
mod xtm_error;  // Error types
mod xtm_game;   // Session state machine and scoring rules
mod xtm_scores; // High score persistence
mod xtm_ui;     // Terminal rendering, input and run loop

use xtm_config::{Config, data_dir, load_or_create_config};
use xtm_game::Difficulty;
use xtm_scores::{FileScoreStore, ScoreStore, format_table};

/// Terminal Minesweeper
#[derive(Parser, Debug)]
#[command(name = "xtmines", version, about, disable_help_flag = true)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["easy", "normal", "hard", "scores"])
))]
struct Args {
    /// Easy game (5 mines)
    #[arg(short, long)]
    easy: bool,
    /// Normal game (15 mines)
    #[arg(short, long)]
    normal: bool,
    /// Hard game (25 mines)
    #[arg(short = 'h', long)]
    hard: bool,
    /// Print the high score table and exit
    #[arg(short, long)]
    scores: bool,
    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Args {
    /// Selected difficulty, or None for the score table
    fn difficulty(&self) -> Option<Difficulty> {
        if self.easy {
            Some(Difficulty::Easy)
        } else if self.normal {
            Some(Difficulty::Normal)
        } else if self.hard {
            Some(Difficulty::Hard)
        } else {
            None
        }
    }
}

/// Send tracing output to xtmines.log; the terminal itself belongs to the game
fn init_logging(cfg: &Config) {
    let Some(dir) = data_dir() else { return };
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("xtmines.log"))
    else {
        return;
    };
    let filter = EnvFilter::try_from_env("XTMINES_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn show_scores() -> Result<(), Box<dyn Error>> {
    let store = FileScoreStore::open_default()?;
    let top = store
        .top_scores()
        .map_err(|e| format!("{}: {e}", store.path().display()))?;
    print!("{}", format_table(&top));
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let cfg = load_or_create_config();
    init_logging(&cfg);

    let Some(difficulty) = args.difficulty() else {
        return show_scores();
    };
    info!(?difficulty, rows = cfg.rows, cols = cfg.cols, "starting");
    xtm_ui::run(&cfg, difficulty)?;
    Ok(())
}
