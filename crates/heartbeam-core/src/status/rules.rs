use serde::{Deserialize, Serialize};

/// Numeric parameters of the adherence rules.
///
/// Defaults reproduce the study protocol; `Config::rules()` builds one from
/// the TOML configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyRules {
    /// Plays on one calendar day needed for it to count as a Lumosity day
    pub lumosity_min_plays_per_day: u32,
    /// Lower bound of the Lumosity window, in days before now
    pub lumosity_lookback_days: i64,
    /// Expected stage 3 breathing segments per day
    pub stage3_segments_per_day: u32,
    /// Trailing window for counting stage 3 segments, in days
    pub stage3_window_days: i64,
    /// Stage 3 segments a participant must do today before the
    /// stage 3 reminder is suppressed
    pub stage3_daily_segments: usize,
}

impl Default for StudyRules {
    fn default() -> Self {
        Self {
            lumosity_min_plays_per_day: 6,
            lumosity_lookback_days: 6,
            stage3_segments_per_day: 6,
            stage3_window_days: 5,
            stage3_daily_segments: 6,
        }
    }
}
