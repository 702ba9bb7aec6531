mod config;
pub mod database;
pub mod migrations;

pub use config::Config;
pub use database::{ImportSummary, StudyDb};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/heartbeam[-dev]/` based on HEARTBEAM_ENV.
///
/// Set HEARTBEAM_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("HEARTBEAM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("heartbeam-dev")
    } else {
        base_dir.join("heartbeam")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
