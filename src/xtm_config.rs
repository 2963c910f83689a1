// User configuration and platform paths
// The config file is TOML, created with defaults on first run

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

const APP_NAME: &str = "xtmines";

/// Persisted preferences
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub rows: usize,        // Board height in tiles
    pub cols: usize,        // Board width in tiles
    pub ascii_icons: bool,  // Use ASCII fallback glyphs
    pub log_level: String,  // tracing filter used when XTMINES_LOG is unset
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rows: 10,
            cols: 10,
            ascii_icons: false,
            log_level: "info".to_string(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "xhbl", APP_NAME)
}

/// Get the configuration file path
/// e.g. ~/.config/xtmines/xtmines.toml on Linux
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|proj| proj.config_dir().join(format!("{APP_NAME}.toml")))
}

/// Directory for the score table and the log file
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|proj| proj.data_dir().to_path_buf())
}

/// Parse a config file body, falling back to defaults on bad input
pub fn parse_config(s: &str) -> Config {
    toml::from_str::<Config>(s).unwrap_or_else(|e| {
        warn!("ignoring malformed config: {e}");
        Config::default()
    })
}

/// Load configuration from disk, or write the defaults if none exists
pub fn load_or_create_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    if path.exists() {
        return match fs::read_to_string(&path) {
            Ok(s) => parse_config(&s),
            Err(e) => {
                warn!("cannot read {}: {e}", path.display());
                Config::default()
            }
        };
    }
    let cfg = Config::default();
    if let Ok(s) = toml::to_string(&cfg) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::write(&path, s);
    }
    cfg
}
