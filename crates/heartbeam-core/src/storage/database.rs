//! SQLite-backed study store.
//!
//! Provides persistent storage for:
//! - Participants with their milestones, contact details and completion flags
//! - Cognitive-task set records
//! - Breathing segments
//! - Lumosity plays

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{migrations, Config};
use crate::data::{StudyData, StudySnapshot};
use crate::error::DataError;
use crate::events::{EventKind, EventRecord};
use crate::participant::Participant;
use crate::reminders::ParticipantDirectory;
use crate::status::BaselineMode;

const PARTICIPANT_COLUMNS: &str = "user_id, identity_id, human_id, start_date, created_at, progress,
     email, phone_number, phone_number_verified, pre_complete, post_complete, home_complete";

/// Row counts written by [`StudyDb::import`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub participants: usize,
    pub sets: usize,
    pub segments: usize,
    pub lumos_plays: usize,
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_instant(field: &str, value: &str) -> Result<DateTime<Utc>, DataError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| DataError::Decode {
            field: field.into(),
            value: value.into(),
        })
}

/// Smallest whole second not before `since`.
fn ceil_seconds(since: DateTime<Utc>) -> i64 {
    let secs = since.timestamp();
    if since.timestamp_subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

struct ParticipantRow {
    user_id: String,
    identity_id: Option<String>,
    human_id: Option<String>,
    start_date: Option<String>,
    created_at: String,
    progress: String,
    email: Option<String>,
    phone_number: Option<String>,
    phone_number_verified: bool,
    pre_complete: bool,
    post_complete: bool,
    home_complete: bool,
}

impl ParticipantRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            identity_id: row.get(1)?,
            human_id: row.get(2)?,
            start_date: row.get(3)?,
            created_at: row.get(4)?,
            progress: row.get(5)?,
            email: row.get(6)?,
            phone_number: row.get(7)?,
            phone_number_verified: row.get(8)?,
            pre_complete: row.get(9)?,
            post_complete: row.get(10)?,
            home_complete: row.get(11)?,
        })
    }

    fn decode(self) -> Result<Participant, DataError> {
        let start_date = self
            .start_date
            .map(|s| {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| DataError::Decode {
                    field: "start_date".into(),
                    value: s.clone(),
                })
            })
            .transpose()?;
        let progress: BTreeMap<String, DateTime<Utc>> = serde_json::from_str(&self.progress)
            .map_err(|_| DataError::Decode {
                field: "progress".into(),
                value: self.progress.clone(),
            })?;
        Ok(Participant {
            created_at: parse_instant("created_at", &self.created_at)?,
            user_id: self.user_id,
            identity_id: self.identity_id,
            human_id: self.human_id,
            start_date,
            progress,
            email: self.email,
            phone_number: self.phone_number,
            phone_number_verified: self.phone_number_verified,
            pre_complete: self.pre_complete,
            post_complete: self.post_complete,
            home_complete: self.home_complete,
        })
    }
}

fn decode_set(kind: String, occurred_at: String, set_num: Option<i64>) -> Result<EventRecord, DataError> {
    let kind: EventKind = kind.parse()?;
    let set_num = set_num
        .map(|n| {
            u8::try_from(n).map_err(|_| DataError::Decode {
                field: "set_num".into(),
                value: n.to_string(),
            })
        })
        .transpose()?;
    Ok(EventRecord {
        kind,
        occurred_at: parse_instant("occurred_at", &occurred_at)?,
        set_num,
        stage: None,
        ended_at: None,
        game: None,
    })
}

/// SQLite database of participants and their events.
pub struct StudyDb {
    conn: Connection,
}

impl StudyDb {
    /// Open (creating if needed) the database at `path` and migrate it.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, DataError> {
        let conn = Connection::open(path).map_err(|source| DataError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        tracing::debug!(path = %path.display(), "study database opened");
        Ok(db)
    }

    /// Open the database named by `config`.
    pub fn open_default(config: &Config) -> crate::error::Result<Self> {
        Ok(Self::open(&config.database_path()?)?)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DataError> {
        let conn = Connection::open_in_memory().map_err(|source| DataError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DataError> {
        migrations::migrate(&self.conn).map_err(|e| DataError::MigrationFailed(e.to_string()))
    }

    /// Insert or replace a participant record.
    pub fn upsert_participant(&self, participant: &Participant) -> Result<(), DataError> {
        let progress = serde_json::to_string(&participant.progress)
            .map_err(|e| DataError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            &format!("INSERT OR REPLACE INTO participants ({PARTICIPANT_COLUMNS})
                      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
            params![
                participant.user_id,
                participant.identity_id,
                participant.human_id,
                participant.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
                format_instant(participant.created_at),
                progress,
                participant.email,
                participant.phone_number,
                participant.phone_number_verified,
                participant.pre_complete,
                participant.post_complete,
                participant.home_complete,
            ],
        )?;
        Ok(())
    }

    /// Record a set-started or set-finished event.
    ///
    /// `identity_id` is the result identity finished sets are looked up by.
    pub fn record_set(
        &self,
        user_id: &str,
        identity_id: &str,
        record: &EventRecord,
    ) -> Result<i64, DataError> {
        if !record.kind.is_set() {
            return Err(DataError::Decode {
                field: "event kind".into(),
                value: record.kind.as_str().into(),
            });
        }
        self.conn.execute(
            "INSERT INTO set_events (user_id, identity_id, kind, occurred_at, set_num)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                identity_id,
                record.kind.as_str(),
                format_instant(record.occurred_at),
                record.set_num,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record a breathing segment ending at `ended_at` epoch seconds.
    pub fn record_segment(&self, human_id: &str, stage: u8, ended_at: i64) -> Result<i64, DataError> {
        self.conn.execute(
            "INSERT INTO segments (human_id, stage, ended_at) VALUES (?1, ?2, ?3)",
            params![human_id, stage, ended_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn record_lumos_play(
        &self,
        user_id: &str,
        played_at: DateTime<Utc>,
        game: Option<&str>,
    ) -> Result<i64, DataError> {
        self.conn.execute(
            "INSERT INTO lumos_plays (user_id, played_at, game) VALUES (?1, ?2, ?3)",
            params![user_id, format_instant(played_at), game],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Flag a participant's `mode` baseline as complete.
    pub fn mark_baseline_complete(&self, user_id: &str, mode: BaselineMode) -> Result<(), DataError> {
        let sql = match mode {
            BaselineMode::Pre => "UPDATE participants SET pre_complete = 1 WHERE user_id = ?1",
            BaselineMode::Post => "UPDATE participants SET post_complete = 1 WHERE user_id = ?1",
        };
        let updated = self.conn.execute(sql, params![user_id])?;
        if updated == 0 {
            return Err(DataError::ParticipantNotFound(user_id.to_string()));
        }
        tracing::info!(user_id, mode = %mode, "baseline marked complete");
        Ok(())
    }

    /// All participants, oldest first.
    pub fn participants(&self) -> Result<Vec<Participant>, DataError> {
        self.query_participants("1 = 1", [])
    }

    /// Load a snapshot in a single transaction.
    ///
    /// Set records are stored under the result identity of the participant
    /// they belong to, or under the user id for unknown users.
    pub fn import(&self, snapshot: &StudySnapshot) -> Result<ImportSummary, DataError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut summary = ImportSummary::default();

        for participant in &snapshot.participants {
            self.upsert_participant(participant)?;
            summary.participants += 1;
        }

        let identities: BTreeMap<&str, &str> = snapshot
            .participants
            .iter()
            .map(|p| (p.user_id.as_str(), p.result_identity()))
            .collect();
        for (user_id, records) in &snapshot.sets {
            let identity = identities.get(user_id.as_str()).copied().unwrap_or(user_id.as_str());
            for record in records {
                self.record_set(user_id, identity, record)?;
                summary.sets += 1;
            }
        }

        for (human_id, records) in &snapshot.segments {
            for record in records {
                let stage = record.stage.ok_or_else(|| DataError::Decode {
                    field: "stage".into(),
                    value: format!("missing on segment of {human_id}"),
                })?;
                self.record_segment(human_id, stage, record.segment_end().timestamp())?;
                summary.segments += 1;
            }
        }

        for (user_id, records) in &snapshot.lumos_plays {
            for record in records {
                self.record_lumos_play(user_id, record.occurred_at, record.game.as_deref())?;
                summary.lumos_plays += 1;
            }
        }

        tx.commit()?;
        tracing::info!(
            participants = summary.participants,
            sets = summary.sets,
            segments = summary.segments,
            lumos_plays = summary.lumos_plays,
            "snapshot imported"
        );
        Ok(summary)
    }

    fn query_participants<P: rusqlite::Params>(
        &self,
        filter: &str,
        params: P,
    ) -> Result<Vec<Participant>, DataError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE {filter}
             ORDER BY created_at, user_id"
        ))?;
        let rows = stmt
            .query_map(params, ParticipantRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ParticipantRow::decode).collect()
    }

    fn query_sets<P: rusqlite::Params>(&self, filter: &str, params: P) -> Result<Vec<EventRecord>, DataError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT kind, occurred_at, set_num FROM set_events WHERE {filter}
             ORDER BY occurred_at, id"
        ))?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(kind, at, set_num)| decode_set(kind, at, set_num))
            .collect()
    }
}

impl StudyData for StudyDb {
    fn get_user(&self, participant_id: &str) -> Result<Participant, DataError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE user_id = ?1"),
                params![participant_id],
                ParticipantRow::from_row,
            )
            .optional()?;
        match row {
            Some(row) => row.decode(),
            None => Err(DataError::ParticipantNotFound(participant_id.to_string())),
        }
    }

    fn get_finished_sets(&self, identity_id: &str) -> Result<Vec<EventRecord>, DataError> {
        self.query_sets(
            "identity_id = ?1 AND kind = ?2",
            params![identity_id, EventKind::SetFinished.as_str()],
        )
    }

    fn get_sets_for_user(&self, user_id: &str) -> Result<Vec<EventRecord>, DataError> {
        self.query_sets("user_id = ?1", params![user_id])
    }

    fn segments_for_user(
        &self,
        human_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, DataError> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, ended_at FROM segments
             WHERE human_id = ?1 AND ended_at >= ?2
             ORDER BY ended_at, id",
        )?;
        let floor = since.map_or(i64::MIN, ceil_seconds);
        let rows = stmt
            .query_map(params![human_id, floor], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(stage, ended_at)| {
                let stage = u8::try_from(stage).map_err(|_| DataError::Decode {
                    field: "stage".into(),
                    value: stage.to_string(),
                })?;
                Ok(EventRecord::breathing_segment(stage, ended_at))
            })
            .collect()
    }

    fn lumos_plays_for_user(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventRecord>, DataError> {
        let mut stmt = self.conn.prepare(
            "SELECT played_at, game FROM lumos_plays
             WHERE user_id = ?1 AND played_at >= ?2
             ORDER BY played_at, id",
        )?;
        let lower = since.map(format_instant).unwrap_or_default();
        let rows = stmt
            .query_map(params![user_id, lower], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut plays = Vec::with_capacity(rows.len());
        for (at, game) in rows {
            let at = parse_instant("played_at", &at)?;
            // Stored text has millisecond precision; recheck against the exact bound.
            if since.map_or(true, |since| at >= since) {
                let mut play = EventRecord::lumosity_play(at);
                play.game = game;
                plays.push(play);
            }
        }
        Ok(plays)
    }
}

impl ParticipantDirectory for StudyDb {
    fn baseline_incomplete(&self, mode: BaselineMode) -> Result<Vec<Participant>, DataError> {
        match mode {
            BaselineMode::Pre => self.query_participants("pre_complete = 0", []),
            BaselineMode::Post => self.query_participants("post_complete = 0", []),
        }
    }

    fn home_training_in_progress(&self) -> Result<Vec<Participant>, DataError> {
        self.query_participants("pre_complete = 1 AND home_complete = 0", [])
    }

    fn starting_on(&self, date: NaiveDate) -> Result<Vec<Participant>, DataError> {
        self.query_participants("start_date = ?1", params![date.format("%Y-%m-%d").to_string()])
    }

    fn repeat_lumos_players(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>, DataError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT user_id FROM (
                 SELECT user_id FROM lumos_plays
                 WHERE game IS NOT NULL AND played_at >= ?1 AND played_at < ?2
                 GROUP BY user_id, game
                 HAVING COUNT(*) > 1
             )
             ORDER BY user_id",
        )?;
        let users = stmt
            .query_map(params![format_instant(from), format_instant(to)], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 19, 0, 0).unwrap()
    }

    fn participant() -> Participant {
        let mut p = Participant::new("u-1", base() - Duration::days(3));
        p.identity_id = Some("us-west-2:abc".into());
        p.human_id = Some("FastCow".into());
        p.start_date = NaiveDate::from_ymd_opt(2024, 6, 17);
        p.email = Some("p1@example.org".into());
        p.progress.insert("visit1".into(), base() - Duration::days(2));
        p
    }

    #[test]
    fn participant_roundtrip() {
        let db = StudyDb::open_memory().unwrap();
        let p = participant();
        db.upsert_participant(&p).unwrap();
        assert_eq!(db.get_user("u-1").unwrap(), p);
        assert!(matches!(
            db.get_user("u-2"),
            Err(DataError::ParticipantNotFound(id)) if id == "u-2"
        ));
    }

    #[test]
    fn finished_sets_keyed_by_identity() {
        let db = StudyDb::open_memory().unwrap();
        db.record_set("u-1", "us-west-2:abc", &EventRecord::set_started(base() - Duration::hours(2)))
            .unwrap();
        db.record_set("u-1", "us-west-2:abc", &EventRecord::set_finished(base() - Duration::hours(1), 1))
            .unwrap();

        let finished = db.get_finished_sets("us-west-2:abc").unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].set_num, Some(1));
        assert_eq!(finished[0].occurred_at, base() - Duration::hours(1));
        assert_eq!(db.get_sets_for_user("u-1").unwrap().len(), 2);
        assert!(db.get_finished_sets("u-1").unwrap().is_empty());
    }

    #[test]
    fn record_set_rejects_other_kinds() {
        let db = StudyDb::open_memory().unwrap();
        assert!(db.record_set("u-1", "u-1", &EventRecord::lumosity_play(base())).is_err());
    }

    #[test]
    fn segments_filter_on_end_time() {
        let db = StudyDb::open_memory().unwrap();
        let end = base().timestamp();
        db.record_segment("FastCow", 2, end - 3 * 86_400).unwrap();
        db.record_segment("FastCow", 2, end).unwrap();

        assert_eq!(db.segments_for_user("FastCow", None).unwrap().len(), 2);
        let recent = db.segments_for_user("FastCow", Some(base() - Duration::days(1))).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].segment_end(), base());
        assert_eq!(recent[0].stage, Some(2));

        let just_after = base() + Duration::milliseconds(1);
        assert!(db.segments_for_user("FastCow", Some(just_after)).unwrap().is_empty());
    }

    #[test]
    fn lumos_plays_since_is_inclusive() {
        let db = StudyDb::open_memory().unwrap();
        db.record_lumos_play("u-1", base() - Duration::days(7), None).unwrap();
        db.record_lumos_play("u-1", base() - Duration::days(6), None).unwrap();
        db.record_lumos_play("u-1", base(), Some("Train of Thought")).unwrap();

        let plays = db.lumos_plays_for_user("u-1", Some(base() - Duration::days(6))).unwrap();
        assert_eq!(plays.len(), 2);
        assert!(plays.iter().all(|p| p.kind == EventKind::LumosityPlay));
        assert_eq!(plays[1].game.as_deref(), Some("Train of Thought"));
    }

    #[test]
    fn repeat_lumos_players_groups_by_game_within_bounds() {
        let db = StudyDb::open_memory().unwrap();
        let from = base() - Duration::days(1);
        let to = base();
        // Same game twice inside the window
        db.record_lumos_play("twice", from + Duration::hours(1), Some("Speed Match")).unwrap();
        db.record_lumos_play("twice", from + Duration::hours(2), Some("Speed Match")).unwrap();
        // Different games
        db.record_lumos_play("varied", from + Duration::hours(1), Some("Speed Match")).unwrap();
        db.record_lumos_play("varied", from + Duration::hours(2), Some("Lost in Migration")).unwrap();
        // Second play lands on the upper bound
        db.record_lumos_play("edge", from, Some("Speed Match")).unwrap();
        db.record_lumos_play("edge", to, Some("Speed Match")).unwrap();
        // Game unknown
        db.record_lumos_play("untagged", from + Duration::hours(1), None).unwrap();
        db.record_lumos_play("untagged", from + Duration::hours(2), None).unwrap();

        assert_eq!(db.repeat_lumos_players(from, to).unwrap(), vec!["twice"]);
    }

    #[test]
    fn mark_baseline_complete_updates_directory() {
        let db = StudyDb::open_memory().unwrap();
        db.upsert_participant(&participant()).unwrap();
        assert_eq!(db.baseline_incomplete(BaselineMode::Pre).unwrap().len(), 1);

        db.mark_baseline_complete("u-1", BaselineMode::Pre).unwrap();
        assert!(db.baseline_incomplete(BaselineMode::Pre).unwrap().is_empty());
        assert_eq!(db.home_training_in_progress().unwrap().len(), 1);
        assert!(matches!(
            db.mark_baseline_complete("nobody", BaselineMode::Post),
            Err(DataError::ParticipantNotFound(_))
        ));
    }

    #[test]
    fn starting_on_matches_civil_date() {
        let db = StudyDb::open_memory().unwrap();
        db.upsert_participant(&participant()).unwrap();
        let hits = db.starting_on(NaiveDate::from_ymd_opt(2024, 6, 17).unwrap()).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(db.starting_on(NaiveDate::from_ymd_opt(2024, 6, 18).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn import_uses_result_identity_for_sets() {
        let db = StudyDb::open_memory().unwrap();
        let mut snapshot = StudySnapshot::default();
        snapshot.participants.push(participant());
        snapshot
            .sets
            .insert("u-1".into(), vec![EventRecord::set_finished(base(), 3)]);
        snapshot
            .segments
            .insert("FastCow".into(), vec![EventRecord::breathing_segment(1, base().timestamp())]);
        snapshot
            .lumos_plays
            .insert("u-1".into(), vec![EventRecord::lumosity_play(base()).with_game("Memory Match")]);

        let summary = db.import(&snapshot).unwrap();
        assert_eq!(
            summary,
            ImportSummary { participants: 1, sets: 1, segments: 1, lumos_plays: 1 }
        );
        assert_eq!(db.get_finished_sets("us-west-2:abc").unwrap().len(), 1);
        let plays = db.lumos_plays_for_user("u-1", None).unwrap();
        assert_eq!(plays[0].game.as_deref(), Some("Memory Match"));
    }

    #[test]
    fn import_is_atomic() {
        let db = StudyDb::open_memory().unwrap();
        let mut snapshot = StudySnapshot::default();
        snapshot.participants.push(participant());
        let mut bad = EventRecord::breathing_segment(2, base().timestamp());
        bad.stage = None;
        snapshot.segments.insert("FastCow".into(), vec![bad]);

        assert!(db.import(&snapshot).is_err());
        assert!(db.participants().unwrap().is_empty());
    }
}
