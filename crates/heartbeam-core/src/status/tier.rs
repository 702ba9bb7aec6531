use serde::{Deserialize, Serialize};

/// Traffic-light adherence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Green,
    Yellow,
    Red,
    /// Blocked until staff act (e.g. the stage 1 lab visit has not happened)
    Gray,
}

impl Tier {
    /// Health rank: higher is better. Red < Yellow < Green; Gray ranks below
    /// Red so that a blocked input always dominates a combination.
    pub fn rank(self) -> u8 {
        match self {
            Tier::Gray => 0,
            Tier::Red => 1,
            Tier::Yellow => 2,
            Tier::Green => 3,
        }
    }

    /// The more severe of two tiers.
    pub fn worst(self, other: Tier) -> Tier {
        if other.rank() < self.rank() {
            other
        } else {
            self
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Green => "green",
            Tier::Yellow => "yellow",
            Tier::Red => "red",
            Tier::Gray => "gray",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived status of one participant.
///
/// Serialized with the field names the admin dashboard reads:
/// `status`, `lumosity`, `breathing`, `sets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    #[serde(rename = "status")]
    pub overall: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lumosity: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breathing: Option<Tier>,
    /// Human-readable progress, e.g. "3/6"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<String>,
}

impl StatusResult {
    pub fn single(overall: Tier) -> Self {
        Self {
            overall,
            lumosity: None,
            breathing: None,
            sets: None,
        }
    }

    /// Whole-result override for participants who cannot proceed yet.
    pub fn blocked() -> Self {
        Self::single(Tier::Gray)
    }

    /// Combine training sub-statuses; the overall tier is the worst of them.
    pub fn training(lumosity: Tier, breathing: Tier) -> Self {
        Self {
            overall: lumosity.worst(breathing),
            lumosity: Some(lumosity),
            breathing: Some(breathing),
            sets: None,
        }
    }

    pub fn with_sets(mut self, sets: impl Into<String>) -> Self {
        self.sets = Some(sets.into());
        self
    }
}

/// Tier for a "one unit per elapsed day" quota, shared by baseline sets and
/// stage 2 breathing.
///
/// - `elapsed <= 1`: green
/// - `elapsed` 2 or 3: green when `done >= elapsed - 1`, else yellow
/// - later: green at `elapsed - 1`, yellow at `elapsed - 2`, else red
pub(crate) fn daily_quota_tier(elapsed_days: i64, done: usize) -> Tier {
    let done = i64::try_from(done).unwrap_or(i64::MAX);
    if elapsed_days <= 1 {
        Tier::Green
    } else if elapsed_days <= 3 {
        if done >= elapsed_days - 1 {
            Tier::Green
        } else {
            Tier::Yellow
        }
    } else if done >= elapsed_days - 1 {
        Tier::Green
    } else if done >= elapsed_days - 2 {
        Tier::Yellow
    } else {
        Tier::Red
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_follows_severity_order() {
        assert_eq!(Tier::Green.worst(Tier::Yellow), Tier::Yellow);
        assert_eq!(Tier::Yellow.worst(Tier::Red), Tier::Red);
        assert_eq!(Tier::Red.worst(Tier::Green), Tier::Red);
        assert_eq!(Tier::Green.worst(Tier::Green), Tier::Green);
        assert_eq!(Tier::Red.worst(Tier::Gray), Tier::Gray);
    }

    #[test]
    fn training_overall_is_worst_sub_status() {
        let status = StatusResult::training(Tier::Green, Tier::Red);
        assert_eq!(status.overall, Tier::Red);
        assert_eq!(status.lumosity, Some(Tier::Green));
        assert_eq!(status.breathing, Some(Tier::Red));
    }

    #[test]
    fn serializes_with_dashboard_field_names() {
        let json = serde_json::to_value(StatusResult::training(Tier::Yellow, Tier::Green)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "yellow", "lumosity": "yellow", "breathing": "green"})
        );

        let json = serde_json::to_value(StatusResult::single(Tier::Red).with_sets("0/6")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "red", "sets": "0/6"}));

        let json = serde_json::to_value(StatusResult::blocked()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "gray"}));
    }

    #[test]
    fn daily_quota_boundaries() {
        assert_eq!(daily_quota_tier(0, 0), Tier::Green);
        assert_eq!(daily_quota_tier(1, 0), Tier::Green);
        assert_eq!(daily_quota_tier(2, 1), Tier::Green);
        assert_eq!(daily_quota_tier(2, 0), Tier::Yellow);
        assert_eq!(daily_quota_tier(3, 2), Tier::Green);
        assert_eq!(daily_quota_tier(3, 1), Tier::Yellow);
        assert_eq!(daily_quota_tier(4, 3), Tier::Green);
        assert_eq!(daily_quota_tier(4, 2), Tier::Yellow);
        assert_eq!(daily_quota_tier(4, 1), Tier::Red);
        assert_eq!(daily_quota_tier(9, 6), Tier::Red);
    }
}
