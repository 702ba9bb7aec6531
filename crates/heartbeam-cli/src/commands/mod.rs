pub mod config;
pub mod data;
pub mod reminders;
pub mod status;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use heartbeam_core::{Config, StudyDb};

/// Options shared by every command that touches the study database.
pub struct Context {
    db: Option<PathBuf>,
    as_of: Option<DateTime<Utc>>,
}

impl Context {
    pub fn new(db: Option<PathBuf>, as_of: Option<DateTime<Utc>>) -> Self {
        Self { db, as_of }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }

    /// Open the database given by `--db`, or the configured one.
    pub fn open_db(&self, config: &Config) -> Result<StudyDb, Box<dyn std::error::Error>> {
        let db = match &self.db {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using --db override");
                StudyDb::open(path)?
            }
            None => StudyDb::open_default(config)?,
        };
        Ok(db)
    }
}

pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
