use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::baseline::{self, BaselineMode};
use super::calendar::StudyCalendar;
use super::lumosity::lumosity_tier;
use super::rules::StudyRules;
use super::tier::{StatusResult, Tier};
use super::training;
use crate::data::StudyData;
use crate::error::Result;

/// Derives participant statuses from a [`StudyData`] source.
///
/// Evaluates against the wall clock unless pinned with [`StatusService::as_of`].
pub struct StatusService<'a, D: StudyData + ?Sized> {
    data: &'a D,
    calendar: StudyCalendar,
    rules: StudyRules,
    now: Option<DateTime<Utc>>,
}

impl<'a, D: StudyData + ?Sized> StatusService<'a, D> {
    pub fn new(data: &'a D, calendar: StudyCalendar, rules: StudyRules) -> Self {
        Self {
            data,
            calendar,
            rules,
            now: None,
        }
    }

    /// Evaluate as if the current time were `now`.
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn lumosity_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.rules.lumosity_lookback_days)
    }

    /// Baseline status of a participant for the given half.
    pub fn baseline_status(&self, participant_id: &str, mode: BaselineMode) -> Result<StatusResult> {
        let now = self.now();
        let participant = self.data.get_user(participant_id)?;
        let finished = self.data.get_finished_sets(participant.result_identity())?;
        Ok(baseline::baseline_status(
            &participant,
            &finished,
            mode,
            now,
            &self.calendar,
        ))
    }

    /// Stage 2 status. `participant_id` keys Lumosity plays, `human_id`
    /// keys breathing segments.
    pub fn stage2_status(&self, participant_id: &str, human_id: &str) -> Result<StatusResult> {
        let now = self.now();
        let segments = self.data.segments_for_user(human_id, None)?;
        if segments.is_empty() {
            tracing::debug!(human_id, "no breathing segments; waiting on stage 1 visit");
            return Ok(StatusResult::blocked());
        }
        let plays = self
            .data
            .lumos_plays_for_user(participant_id, Some(self.lumosity_since(now)))?;
        Ok(training::stage2_status(
            &segments,
            &plays,
            now,
            &self.calendar,
            &self.rules,
        ))
    }

    /// Stage 3 status, measured from the day stage 2 was completed.
    pub fn stage3_status(
        &self,
        participant_id: &str,
        human_id: &str,
        stage2_completed_on: NaiveDate,
    ) -> Result<StatusResult> {
        let now = self.now();
        let window_start = now - Duration::days(self.rules.stage3_window_days);
        let segments = self.data.segments_for_user(human_id, Some(window_start))?;
        let plays = self
            .data
            .lumos_plays_for_user(participant_id, Some(self.lumosity_since(now)))?;
        Ok(training::stage3_status(
            stage2_completed_on,
            &segments,
            &plays,
            now,
            &self.calendar,
            &self.rules,
        ))
    }

    /// Lumosity tier alone, for a caller that already knows elapsed days.
    pub fn lumosity_status(&self, user_id: &str, elapsed_days: i64) -> Result<Tier> {
        let now = self.now();
        let plays = self
            .data
            .lumos_plays_for_user(user_id, Some(self.lumosity_since(now)))?;
        Ok(lumosity_tier(&plays, elapsed_days, now, &self.calendar, &self.rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryStudyData;
    use crate::error::{CoreError, DataError};
    use crate::events::EventRecord;
    use crate::participant::Participant;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 19, 0, 0).unwrap()
    }

    fn service(data: &InMemoryStudyData) -> StatusService<'_, InMemoryStudyData> {
        StatusService::new(data, StudyCalendar::default(), StudyRules::default()).as_of(now())
    }

    #[test]
    fn baseline_reads_finished_sets_by_identity() {
        let mut data = InMemoryStudyData::default();
        let mut p = Participant::new("u-1", now() - Duration::hours(90));
        p.identity_id = Some("id-1".into());
        data.add_participant(p);
        for n in 1..=3 {
            data.add_set("u-1", EventRecord::set_finished(now() - Duration::hours(80 - n as i64), n));
        }

        let result = service(&data).baseline_status("u-1", BaselineMode::Pre).unwrap();
        assert_eq!(result.overall, Tier::Green);
        assert_eq!(result.sets.as_deref(), Some("3/6"));
    }

    #[test]
    fn stage2_gray_skips_lumosity_lookup() {
        let data = InMemoryStudyData::default();
        let result = service(&data).stage2_status("u-1", "FastCow").unwrap();
        assert_eq!(result.overall, Tier::Gray);
    }

    #[test]
    fn stage3_uses_explicit_completion_date() {
        let mut data = InMemoryStudyData::default();
        for i in 0..24 {
            data.add_segment("FastCow", EventRecord::breathing_segment(3, (now() - Duration::hours(i + 1)).timestamp()));
        }
        let completed = NaiveDate::from_ymd_opt(2024, 6, 16).unwrap();
        let result = service(&data).stage3_status("u-1", "FastCow", completed).unwrap();
        assert_eq!(result.breathing, Some(Tier::Green));
        assert_eq!(result.lumosity, Some(Tier::Red));
        assert_eq!(result.overall, Tier::Red);
    }

    #[test]
    fn lumosity_status_applies_grace_period() {
        let data = InMemoryStudyData::default();
        assert_eq!(service(&data).lumosity_status("u-1", 1).unwrap(), Tier::Green);
        assert_eq!(service(&data).lumosity_status("u-1", 5).unwrap(), Tier::Red);
    }

    #[test]
    fn collaborator_failures_propagate_unmodified() {
        let data = InMemoryStudyData::failing("throttled");
        let err = service(&data).baseline_status("u-1", BaselineMode::Pre).unwrap_err();
        assert!(matches!(err, CoreError::Data(DataError::Unavailable(ref m)) if m == "throttled"));
    }
}
