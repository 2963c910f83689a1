// High score table persistence
// Scores are kept as TOML in the platform data directory, best first

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use crate::xtm_config::data_dir;
use crate::xtm_error::ScoreError;
use crate::xtm_game::MAX_SCORES;

/// Longest name accepted for the table
pub const MAX_NAME_LEN: usize = 30;

/// One row of the high score table
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub name: String,
    pub score: i64,
    pub date: String, // Date in ISO format (YYYY-MM-DD)
}

/// On-disk layout of the score file
#[derive(Serialize, Deserialize, Default)]
struct ScoreTable {
    #[serde(default)]
    scores: Vec<ScoreEntry>,
}

/// Storage for ranked name/score pairs
///
/// The store only keeps the table bounded; deciding whether a score deserves
/// a name prompt is up to the game (see `xtm_game::qualifies`).
pub trait ScoreStore {
    /// All stored entries, highest score first
    fn top_scores(&self) -> Result<Vec<ScoreEntry>, ScoreError>;
    fn record_score(&mut self, name: &str, score: i64) -> Result<(), ScoreError>;
}

/// Insert a new score, dropping the lowest one when the table overflows
/// Among equal lowest scores the oldest entry goes first
fn insert_ranked(entries: &mut Vec<ScoreEntry>, name: &str, score: i64) {
    if entries.len() >= MAX_SCORES {
        if let Some(lowest) = entries.iter().map(|e| e.score).min() {
            if let Some(pos) = entries.iter().position(|e| e.score == lowest) {
                entries.remove(pos);
            }
        }
    }
    entries.push(ScoreEntry {
        name: name.to_string(),
        score,
        date: Local::now().format("%Y-%m-%d").to_string(),
    });
}

/// Sort best first, keeping insertion order between ties
fn ranked(mut entries: Vec<ScoreEntry>) -> Vec<ScoreEntry> {
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}

/// Trim a typed name and cap its length; blank names are rejected
pub fn clean_name(raw: &str) -> Option<String> {
    let name: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    let name = name.trim_end().to_string();
    if name.is_empty() { None } else { Some(name) }
}

/// Render the table the way the `--scores` mode prints it
pub fn format_table(entries: &[ScoreEntry]) -> String {
    let mut out = String::from("High Scores:\n------------\n");
    if entries.is_empty() {
        out.push_str("No scores yet. Play a game and add one!\n");
    }
    for e in entries {
        // Pad by display width for wide characters
        let pad = 10usize.saturating_sub(e.name.width());
        let _ = writeln!(out, "{}{} {}", e.name, " ".repeat(pad), e.score);
    }
    out
}

/// Score table stored in a TOML file
pub struct FileScoreStore {
    path: PathBuf,
}

impl FileScoreStore {
    /// Store in the per-user data directory (e.g. ~/.local/share/xtmines/scores.toml)
    pub fn open_default() -> Result<Self, ScoreError> {
        let dir = data_dir().ok_or(ScoreError::NoDataDir)?;
        Ok(Self::at(dir.join("scores.toml")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        FileScoreStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<ScoreEntry>, ScoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let s = fs::read_to_string(&self.path)?;
        let table: ScoreTable = toml::from_str(&s)?;
        Ok(table.scores)
    }

    fn save(&self, scores: Vec<ScoreEntry>) -> Result<(), ScoreError> {
        let s = toml::to_string(&ScoreTable { scores })?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, s)?;
        Ok(())
    }
}

impl ScoreStore for FileScoreStore {
    fn top_scores(&self) -> Result<Vec<ScoreEntry>, ScoreError> {
        Ok(ranked(self.load()?))
    }

    fn record_score(&mut self, name: &str, score: i64) -> Result<(), ScoreError> {
        let mut scores = self.load()?;
        insert_ranked(&mut scores, name, score);
        self.save(scores)?;
        debug!(name, score, path = %self.path.display(), "score recorded");
        Ok(())
    }
}

/// In-memory score table
#[cfg(test)]
#[derive(Default)]
pub struct MemoryScoreStore {
    scores: Vec<ScoreEntry>,
}

#[cfg(test)]
impl ScoreStore for MemoryScoreStore {
    fn top_scores(&self) -> Result<Vec<ScoreEntry>, ScoreError> {
        Ok(ranked(self.scores.clone()))
    }

    fn record_score(&mut self, name: &str, score: i64) -> Result<(), ScoreError> {
        insert_ranked(&mut self.scores, name, score);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xtm_game::qualifies;

    fn names(entries: &[ScoreEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn missing_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScoreStore::at(dir.path().join("none.toml"));
        assert!(store.top_scores().unwrap().is_empty());
    }

    #[test]
    fn file_store_round_trips_in_rank_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scores.toml");
        let mut store = FileScoreStore::at(&path);
        store.record_score("ann", 120).unwrap();
        store.record_score("bob", 230).unwrap();
        store.record_score("cat", -4).unwrap();

        let reopened = FileScoreStore::at(&path);
        let top = reopened.top_scores().unwrap();
        assert_eq!(names(&top), ["bob", "ann", "cat"]);
        assert_eq!(top[0].score, 230);
        assert_eq!(top[0].date.len(), 10);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.toml");
        fs::write(&path, "scores = 12").unwrap();
        let store = FileScoreStore::at(&path);
        assert!(matches!(store.top_scores(), Err(ScoreError::Parse(_))));
    }

    #[test]
    fn full_table_evicts_oldest_lowest() {
        let mut store = MemoryScoreStore::default();
        for i in 0..9 {
            store.record_score(&format!("p{i}"), 100 + i).unwrap();
        }
        store.record_score("first-low", 50).unwrap();
        store.record_score("second-low", 50).unwrap();

        let top = store.top_scores().unwrap();
        assert_eq!(top.len(), MAX_SCORES);
        assert_eq!(top.last().map(|e| e.name.as_str()), Some("second-low"));
        assert!(!names(&top).contains(&"first-low"));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut store = MemoryScoreStore::default();
        store.record_score("a", 10).unwrap();
        store.record_score("b", 10).unwrap();
        store.record_score("c", 20).unwrap();
        assert_eq!(names(&store.top_scores().unwrap()), ["c", "a", "b"]);
    }

    #[test]
    fn policy_with_store() {
        let mut store = MemoryScoreStore::default();
        for i in 0..MAX_SCORES as i64 {
            store.record_score("x", 200 + i).unwrap();
        }
        let top = store.top_scores().unwrap();
        assert!(!qualifies(&top, 150));
        assert!(qualifies(&top, 200));
    }

    #[test]
    fn names_are_trimmed_and_capped() {
        assert_eq!(clean_name("  ada  "), Some("ada".to_string()));
        assert_eq!(clean_name("   "), None);
        let long = "n".repeat(50);
        assert_eq!(clean_name(&long).map(|n| n.len()), Some(MAX_NAME_LEN));
    }

    #[test]
    fn table_formatting() {
        assert_eq!(
            format_table(&[]),
            "High Scores:\n------------\nNo scores yet. Play a game and add one!\n"
        );
        let rows = [ScoreEntry {
            name: "ada".into(),
            score: 210,
            date: "2026-10-19".into(),
        }];
        assert_eq!(format_table(&rows), "High Scores:\n------------\nada        210\n");
        let wide = [ScoreEntry {
            name: "雷雷".into(),
            score: 5,
            date: "2026-10-19".into(),
        }];
        assert_eq!(format_table(&wide), "High Scores:\n------------\n雷雷       5\n");
    }
}
