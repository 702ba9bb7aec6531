//! Baseline assessment status (cognitive-task sets).
//!
//! A baseline is six sets done on six consecutive days: sets 1-6 before
//! training and sets 7-12 after it.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::{elapsed_days, StudyCalendar};
use super::tier::{daily_quota_tier, StatusResult, Tier};
use crate::error::ValidationError;
use crate::events::{EventKind, EventRecord};
use crate::participant::Participant;

/// Number of sets in one baseline.
pub const SETS_PER_BASELINE: usize = 6;

/// Which baseline is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineMode {
    Pre,
    Post,
}

impl BaselineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineMode::Pre => "pre",
            BaselineMode::Post => "post",
        }
    }

    /// Set numbers belonging to this baseline.
    pub fn set_range(&self) -> RangeInclusive<u8> {
        match self {
            BaselineMode::Pre => 1..=6,
            BaselineMode::Post => 7..=12,
        }
    }

    pub fn contains(&self, set_num: u8) -> bool {
        self.set_range().contains(&set_num)
    }

    /// Started plus finished records that must exist, counted across both
    /// baselines, before completion is worth checking.
    pub fn min_set_records(&self) -> usize {
        match self {
            BaselineMode::Pre => 2 * SETS_PER_BASELINE,
            BaselineMode::Post => 4 * SETS_PER_BASELINE,
        }
    }
}

impl std::fmt::Display for BaselineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BaselineMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(BaselineMode::Pre),
            "post" => Ok(BaselineMode::Post),
            other => Err(ValidationError::InvalidValue {
                field: "mode".into(),
                message: format!("expected 'pre' or 'post', got '{other}'"),
            }),
        }
    }
}

/// Finished-set records that belong to `mode`.
pub fn finished_count(records: &[EventRecord], mode: BaselineMode) -> usize {
    records
        .iter()
        .filter(|r| r.kind == EventKind::SetFinished)
        .filter(|r| r.set_num.is_some_and(|n| mode.contains(n)))
        .count()
}

/// Tier from elapsed days and finished sets.
pub fn baseline_tier(elapsed_days: i64, finished: usize) -> Tier {
    if elapsed_days <= 1 {
        Tier::Green
    } else if finished == 0 {
        Tier::Red
    } else {
        daily_quota_tier(elapsed_days, finished)
    }
}

/// Baseline status of a participant from their finished-set records.
pub fn baseline_status(
    participant: &Participant,
    finished_sets: &[EventRecord],
    mode: BaselineMode,
    now: DateTime<Utc>,
    calendar: &StudyCalendar,
) -> StatusResult {
    let start = calendar.resolve_start(participant);
    let elapsed = elapsed_days(now, start);
    let finished = finished_count(finished_sets, mode);
    let tier = baseline_tier(elapsed, finished);

    tracing::debug!(
        user_id = %participant.user_id,
        mode = %mode,
        elapsed,
        finished,
        %tier,
        "baseline tier"
    );
    StatusResult::single(tier).with_sets(format!("{finished}/{SETS_PER_BASELINE}"))
}
