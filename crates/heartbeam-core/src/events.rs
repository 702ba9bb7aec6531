use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Kind of behavioral event recorded for a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    SetStarted,
    SetFinished,
    LumosityPlay,
    BreathingSegment,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SetStarted => "set-started",
            EventKind::SetFinished => "set-finished",
            EventKind::LumosityPlay => "lumosity-play",
            EventKind::BreathingSegment => "breathing-segment",
        }
    }

    /// Whether this kind belongs to a cognitive-task set (started or finished).
    pub fn is_set(&self) -> bool {
        matches!(self, EventKind::SetStarted | EventKind::SetFinished)
    }
}

impl std::str::FromStr for EventKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set-started" => Ok(EventKind::SetStarted),
            "set-finished" => Ok(EventKind::SetFinished),
            "lumosity-play" => Ok(EventKind::LumosityPlay),
            "breathing-segment" => Ok(EventKind::BreathingSegment),
            other => Err(DataError::Decode {
                field: "event kind".into(),
                value: other.into(),
            }),
        }
    }
}

/// One behavioral event.
///
/// Only the attributes relevant to `kind` are set: finished sets carry
/// `set_num`, breathing segments carry `stage` and `ended_at`, Lumosity plays
/// may carry `game`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    /// Set number, 1-6 pre-training and 7-12 post-training
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_num: Option<u8>,
    /// Training stage of a breathing segment (1, 2 or 3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<u8>,
    /// Segment end time in whole seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    /// Lumosity game name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
}

impl EventRecord {
    pub fn set_started(at: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::SetStarted,
            occurred_at: at,
            set_num: None,
            stage: None,
            ended_at: None,
            game: None,
        }
    }

    pub fn set_finished(at: DateTime<Utc>, set_num: u8) -> Self {
        Self {
            kind: EventKind::SetFinished,
            occurred_at: at,
            set_num: Some(set_num),
            stage: None,
            ended_at: None,
            game: None,
        }
    }

    pub fn lumosity_play(at: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::LumosityPlay,
            occurred_at: at,
            set_num: None,
            stage: None,
            ended_at: None,
            game: None,
        }
    }

    /// Build a breathing segment from its end time in epoch seconds.
    pub fn breathing_segment(stage: u8, ended_at_secs: i64) -> Self {
        let occurred_at = DateTime::<Utc>::from_timestamp(ended_at_secs, 0).unwrap_or_default();
        Self {
            kind: EventKind::BreathingSegment,
            occurred_at,
            set_num: None,
            stage: Some(stage),
            ended_at: Some(ended_at_secs),
            game: None,
        }
    }

    /// Tag a Lumosity play with the game that was played.
    pub fn with_game(mut self, game: impl Into<String>) -> Self {
        self.game = Some(game.into());
        self
    }

    /// End instant of a breathing segment.
    ///
    /// Segment end times are stored in seconds, unlike every other
    /// timestamp; this is the single place they are scaled. Falls back to
    /// `occurred_at` when `ended_at` is absent or out of range.
    pub fn segment_end(&self) -> DateTime<Utc> {
        self.ended_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or(self.occurred_at)
    }
}
