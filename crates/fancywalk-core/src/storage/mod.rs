mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, FastingConfig, HealthConfig, TimerConfig};
pub use database::{Database, FastingStats, FASTING_SESSIONS, STEP_SNAPSHOTS};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `FANCYWALK_DATA_DIR` wins when set. Otherwise `~/.config/fancywalk`, or
/// `~/.config/fancywalk-dev` with `FANCYWALK_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("FANCYWALK_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FANCYWALK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("fancywalk-dev")
            } else {
                base_dir.join("fancywalk")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
