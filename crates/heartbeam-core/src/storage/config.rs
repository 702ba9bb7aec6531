//! TOML-based configuration.
//!
//! Holds the study calendar and the numeric adherence rules:
//! - Study timezone used for calendar-day bucketing
//! - Lumosity play thresholds
//! - Stage 3 breathing expectations
//! - Database location
//!
//! Configuration is stored at `~/.config/heartbeam/config.toml`.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::status::{StudyCalendar, StudyRules, DEFAULT_TIMEZONE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    /// IANA timezone name defining the study's calendar days
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LumosityConfig {
    #[serde(default = "default_6")]
    pub min_plays_per_day: u32,
    #[serde(default = "default_6_days")]
    pub lookback_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage3Config {
    #[serde(default = "default_6")]
    pub segments_per_day: u32,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Stage 3 segments per day after which no reminder is sent
    #[serde(default = "default_daily_segments")]
    pub stage3_daily_segments: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Overrides `<data dir>/heartbeam.db`
    #[serde(default)]
    pub path: Option<String>,
}

/// Serialized to/from TOML at `~/.config/heartbeam/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub lumosity: LumosityConfig,
    #[serde(default)]
    pub stage3: Stage3Config,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.name().into()
}
fn default_6() -> u32 {
    6
}
fn default_6_days() -> i64 {
    6
}
fn default_window_days() -> i64 {
    5
}
fn default_daily_segments() -> usize {
    6
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl Default for LumosityConfig {
    fn default() -> Self {
        Self {
            min_plays_per_day: 6,
            lookback_days: 6,
        }
    }
}

impl Default for Stage3Config {
    fn default() -> Self {
        Self {
            segments_per_day: 6,
            window_days: 5,
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            stage3_daily_segments: 6,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let unknown = || ConfigError::UnknownKey(key.to_string());

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }
            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }
        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            return Ok(cfg);
        }
        Self::load_from(&path)
    }

    /// Load a config file at an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_failed(e.to_string()))?;
        let cfg: Config = toml::from_str(&content).map_err(|e| load_failed(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        tracing::debug!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::get_json_value_by_path(&json, key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. The change is validated but not
    /// saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// or fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// All leaf keys with their values, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;
        let positive = [
            ("lumosity.min_plays_per_day", i64::from(self.lumosity.min_plays_per_day)),
            ("lumosity.lookback_days", self.lumosity.lookback_days),
            ("stage3.segments_per_day", i64::from(self.stage3.segments_per_day)),
            ("stage3.window_days", self.stage3.window_days),
        ];
        for (key, value) in positive {
            if value < 1 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("must be at least 1, got {value}"),
                });
            }
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.study
            .timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "study.timezone".into(),
                message: e.to_string(),
            })
    }

    pub fn calendar(&self) -> Result<StudyCalendar, ConfigError> {
        Ok(StudyCalendar::new(self.timezone()?))
    }

    pub fn rules(&self) -> StudyRules {
        StudyRules {
            lumosity_min_plays_per_day: self.lumosity.min_plays_per_day,
            lumosity_lookback_days: self.lumosity.lookback_days,
            stage3_segments_per_day: self.stage3.segments_per_day,
            stage3_window_days: self.stage3.window_days,
            stage3_daily_segments: self.reminders.stage3_daily_segments,
        }
    }

    /// Configured database path, or `heartbeam.db` in the data directory.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match self.database.path.as_deref() {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(data_dir()?.join("heartbeam.db")),
        }
    }
}
