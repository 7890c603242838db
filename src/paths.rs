//! Centralized path resolution
//!
//! Every file the bot touches lives under one base directory:
//! - **macOS**: `~/Library/Application Support/ChallengeBot/`
//! - **Windows**: `%LOCALAPPDATA%\ChallengeBot\`
//! - **Linux**: `$XDG_DATA_HOME/ChallengeBot/` (fallback `~/.local/share/ChallengeBot/`)
//!
//! ```text
//! ChallengeBot/
//! ├── data/
//! │   ├── config.toml
//! │   └── challengebot.db
//! └── logs/
//!     └── challengebot_*.log
//! ```

use once_cell::sync::Lazy;
use std::path::PathBuf;

const APP_DIR: &str = "ChallengeBot";

static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(APP_DIR))
}

pub fn get_base_directory() -> PathBuf {
    BASE_DIRECTORY.clone()
}

pub fn get_data_directory() -> PathBuf {
    get_base_directory().join("data")
}

pub fn get_logs_directory() -> PathBuf {
    get_base_directory().join("logs")
}

pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

pub fn get_positions_db_path() -> PathBuf {
    get_data_directory().join("challengebot.db")
}

/// Creates the data and logs directories if missing
pub fn ensure_all_directories() -> Result<(), String> {
    for dir in [get_data_directory(), get_logs_directory()] {
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))?;
    }
    Ok(())
}
