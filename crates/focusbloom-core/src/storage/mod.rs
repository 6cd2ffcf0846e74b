mod config;
pub mod database;
pub mod migrations;
pub mod task_db;

pub use config::{Config, NotificationsConfig, ScheduleConfig, TimerConfig};
pub use database::{CompletedSegment, Database, SessionLog, SessionRecord, Stats};
pub use task_db::SqliteTaskRepository;

use std::path::PathBuf;

use crate::error::ConfigError;

/// File name of the SQLite database inside [`data_dir`].
pub const DB_FILE: &str = "focusbloom.db";

/// Returns `~/.config/focusbloom[-dev]/` based on FOCUSBLOOM_ENV.
///
/// Set FOCUSBLOOM_ENV=dev to use the development data directory, or
/// FOCUSBLOOM_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSBLOOM_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSBLOOM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focusbloom-dev")
            } else {
                base_dir.join("focusbloom")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
