//! Data-access seam between the status engine and whatever store holds
//! participants and their events.
//!
//! [`StudyData`] is implemented by [`crate::storage::StudyDb`] (SQLite) and by
//! [`InMemoryStudyData`], which serves a [`StudySnapshot`] loaded from JSON or
//! built in tests.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::events::{EventKind, EventRecord};
use crate::participant::Participant;
use crate::reminders::ParticipantDirectory;
use crate::status::BaselineMode;

/// Read access to participants and their behavioral events.
///
/// Collections are returned in ascending time order. Errors are passed
/// through to callers unchanged.
pub trait StudyData {
    fn get_user(&self, participant_id: &str) -> Result<Participant, DataError>;

    /// Finished-set records stored under a result identity.
    fn get_finished_sets(&self, identity_id: &str) -> Result<Vec<EventRecord>, DataError>;

    /// Started and finished set records of a user.
    fn get_sets_for_user(&self, user_id: &str) -> Result<Vec<EventRecord>, DataError>;

    /// Breathing segments, optionally only those ending at or after `since`.
    fn segments_for_user(
        &self,
        human_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, DataError>;

    /// Lumosity plays, optionally only those at or after `since`.
    fn lumos_plays_for_user(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, DataError>;
}

/// Participants plus their events, keyed by the id each store uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudySnapshot {
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// user id -> set-started / set-finished records
    #[serde(default)]
    pub sets: BTreeMap<String, Vec<EventRecord>>,
    /// human id -> breathing segments
    #[serde(default)]
    pub segments: BTreeMap<String, Vec<EventRecord>>,
    /// user id -> Lumosity plays
    #[serde(default)]
    pub lumos_plays: BTreeMap<String, Vec<EventRecord>>,
}

/// `StudyData` over an in-memory snapshot.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStudyData {
    snapshot: StudySnapshot,
    unavailable: Option<String>,
}

impl InMemoryStudyData {
    pub fn new(snapshot: StudySnapshot) -> Self {
        Self {
            snapshot,
            unavailable: None,
        }
    }

    /// A source whose every call fails with `DataError::Unavailable`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            snapshot: StudySnapshot::default(),
            unavailable: Some(message.into()),
        }
    }

    pub fn add_participant(&mut self, participant: Participant) {
        self.snapshot.participants.retain(|p| p.user_id != participant.user_id);
        self.snapshot.participants.push(participant);
    }

    pub fn add_set(&mut self, user_id: &str, record: EventRecord) {
        self.snapshot.sets.entry(user_id.to_string()).or_default().push(record);
    }

    pub fn add_segment(&mut self, human_id: &str, record: EventRecord) {
        self.snapshot.segments.entry(human_id.to_string()).or_default().push(record);
    }

    pub fn add_lumos_play(&mut self, user_id: &str, record: EventRecord) {
        self.snapshot.lumos_plays.entry(user_id.to_string()).or_default().push(record);
    }

    fn check(&self) -> Result<(), DataError> {
        match &self.unavailable {
            Some(message) => Err(DataError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn sorted(mut records: Vec<EventRecord>) -> Vec<EventRecord> {
        records.sort_by_key(|r| r.occurred_at);
        records
    }

    fn participants_where(&self, keep: impl Fn(&Participant) -> bool) -> Result<Vec<Participant>, DataError> {
        self.check()?;
        Ok(self.snapshot.participants.iter().filter(|p| keep(p)).cloned().collect())
    }
}

impl StudyData for InMemoryStudyData {
    fn get_user(&self, participant_id: &str) -> Result<Participant, DataError> {
        self.check()?;
        self.snapshot
            .participants
            .iter()
            .find(|p| p.user_id == participant_id)
            .cloned()
            .ok_or_else(|| DataError::ParticipantNotFound(participant_id.to_string()))
    }

    fn get_finished_sets(&self, identity_id: &str) -> Result<Vec<EventRecord>, DataError> {
        self.check()?;
        let records = self
            .snapshot
            .participants
            .iter()
            .filter(|p| p.result_identity() == identity_id)
            .filter_map(|p| self.snapshot.sets.get(&p.user_id))
            .flatten()
            .filter(|r| r.kind == EventKind::SetFinished)
            .cloned()
            .collect();
        Ok(Self::sorted(records))
    }

    fn get_sets_for_user(&self, user_id: &str) -> Result<Vec<EventRecord>, DataError> {
        self.check()?;
        let records = self
            .snapshot
            .sets
            .get(user_id)
            .map(|records| records.iter().filter(|r| r.kind.is_set()).cloned().collect())
            .unwrap_or_default();
        Ok(Self::sorted(records))
    }

    fn segments_for_user(
        &self,
        human_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, DataError> {
        self.check()?;
        let mut records: Vec<EventRecord> = self
            .snapshot
            .segments
            .get(human_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|s| since.map_or(true, |since| s.segment_end() >= since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(EventRecord::segment_end);
        Ok(records)
    }

    fn lumos_plays_for_user(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, DataError> {
        self.check()?;
        let records = self
            .snapshot
            .lumos_plays
            .get(user_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|p| since.map_or(true, |since| p.occurred_at >= since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::sorted(records))
    }
}

impl ParticipantDirectory for InMemoryStudyData {
    fn baseline_incomplete(&self, mode: BaselineMode) -> Result<Vec<Participant>, DataError> {
        self.participants_where(|p| match mode {
            BaselineMode::Pre => !p.pre_complete,
            BaselineMode::Post => !p.post_complete,
        })
    }

    fn home_training_in_progress(&self) -> Result<Vec<Participant>, DataError> {
        self.participants_where(|p| p.pre_complete && !p.home_complete)
    }

    fn starting_on(&self, date: NaiveDate) -> Result<Vec<Participant>, DataError> {
        self.participants_where(|p| p.start_date == Some(date))
    }

    fn repeat_lumos_players(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>, DataError> {
        self.check()?;
        let users = self
            .snapshot
            .lumos_plays
            .iter()
            .filter(|(_, plays)| {
                let mut seen = BTreeSet::new();
                plays
                    .iter()
                    .filter(|p| p.occurred_at >= from && p.occurred_at < to)
                    .filter_map(|p| p.game.as_deref())
                    .any(|game| !seen.insert(game))
            })
            .map(|(user_id, _)| user_id.clone())
            .collect();
        Ok(users)
    }
}
