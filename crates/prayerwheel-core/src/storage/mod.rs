mod config;
pub mod database;
pub mod migrations;
mod traits;

pub use config::{CompensationConfig, Config, HistoryConfig, PersistenceConfig, RotationConfig};
pub use database::{CounterProvenance, Database};
pub use traits::{CounterPersistence, HistoryPersistence, SnapshotPersistence};

use std::path::PathBuf;

use crate::error::DatabaseError;

/// Returns `~/.config/prayerwheel[-dev]/` based on PRAYERWHEEL_ENV.
///
/// Set PRAYERWHEEL_ENV=dev to use the development data directory, or
/// PRAYERWHEEL_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, DatabaseError> {
    let dir = match std::env::var_os("PRAYERWHEEL_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("PRAYERWHEEL_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("prayerwheel-dev")
            } else {
                base_dir.join("prayerwheel")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
