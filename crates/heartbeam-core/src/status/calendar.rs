//! Elapsed-day arithmetic and calendar-day bucketing in the study timezone.
//!
//! Every status rule measures time in two ways:
//! - **Elapsed days**: whole 24-hour periods between two instants, truncated
//!   (23h59m is 0 days, 24h is 1 day)
//! - **Calendar days**: the civil date an instant falls on in the study
//!   timezone, used to group plays and sets by day regardless of time of day

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ValidationError;
use crate::participant::Participant;

/// Timezone the study operates in unless configured otherwise.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Los_Angeles;

/// Whole days between `start` and `now`, truncated toward zero.
pub fn elapsed_days(now: DateTime<Utc>, start: DateTime<Utc>) -> i64 {
    (now - start).num_days()
}

/// Parse a civil date given as `YYYY-MM-DD` or `YYYYMMDD`.
pub fn parse_civil_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y%m%d"))
        .map_err(|_| ValidationError::InvalidDate {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Calendar of the study: maps instants to civil dates and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudyCalendar {
    tz: Tz,
}

impl Default for StudyCalendar {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl StudyCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// The instant a civil date begins in the study timezone.
    pub fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => t.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // Midnight skipped by a DST jump; the day starts at the end of the gap.
            LocalResult::None => self.first_valid_after(naive),
        }
    }

    fn first_valid_after(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        (1..=3)
            .filter_map(|h| {
                self.tz
                    .from_local_datetime(&(naive + chrono::Duration::hours(h)))
                    .earliest()
            })
            .map(|t| t.with_timezone(&Utc))
            .next()
            .unwrap_or_else(|| naive.and_utc())
    }

    /// Effective start of a participant's study period.
    ///
    /// A staff-assigned `start_date` wins over account creation time.
    pub fn resolve_start(&self, participant: &Participant) -> DateTime<Utc> {
        match participant.start_date {
            Some(date) => self.local_midnight(date),
            None => participant.created_at,
        }
    }

    /// Civil date `instant` falls on in the study timezone.
    pub fn day_bucket(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.day_bucket(now)
    }

    /// Half-open `[start, end)` bounds of a civil date.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.local_midnight(date);
        let end = date
            .succ_opt()
            .map(|next| self.local_midnight(next))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, 0).unwrap()
    }

    #[test]
    fn elapsed_days_truncates() {
        let start = utc(2024, 5, 1, 9, 0);
        assert_eq!(elapsed_days(start + Duration::minutes(23 * 60 + 59), start), 0);
        assert_eq!(elapsed_days(start + Duration::hours(24), start), 1);
        assert_eq!(elapsed_days(start + Duration::hours(57), start), 2);
        assert_eq!(elapsed_days(start + Duration::hours(90), start), 3);
    }

    #[test]
    fn elapsed_days_before_start_is_not_positive() {
        let start = utc(2024, 5, 3, 9, 0);
        assert_eq!(elapsed_days(start - Duration::hours(10), start), 0);
        assert_eq!(elapsed_days(start - Duration::hours(50), start), -2);
    }

    #[test]
    fn local_midnight_in_los_angeles() {
        let cal = StudyCalendar::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        // PST is UTC-8
        assert_eq!(cal.local_midnight(date), utc(2024, 1, 15, 8, 0));
        let summer = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        // PDT is UTC-7
        assert_eq!(cal.local_midnight(summer), utc(2024, 7, 15, 7, 0));
    }

    #[test]
    fn resolve_start_prefers_start_date() {
        let cal = StudyCalendar::default();
        let mut p = Participant::new("u-1", utc(2024, 1, 10, 18, 30));
        assert_eq!(cal.resolve_start(&p), utc(2024, 1, 10, 18, 30));

        p.start_date = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(cal.resolve_start(&p), utc(2024, 1, 15, 8, 0));
    }

    #[test]
    fn day_bucket_uses_study_timezone() {
        let cal = StudyCalendar::default();
        // 2024-01-16 05:00 UTC is still the evening of the 15th in Los Angeles
        let late_evening = utc(2024, 1, 16, 5, 0);
        assert_eq!(cal.day_bucket(late_evening).to_string(), "2024-01-15");
        assert_eq!(cal.day_bucket(utc(2024, 1, 16, 8, 0)).to_string(), "2024-01-16");

        let utc_cal = StudyCalendar::new(chrono_tz::UTC);
        assert_eq!(utc_cal.day_bucket(late_evening).to_string(), "2024-01-16");
    }

    #[test]
    fn day_bounds_cover_dst_transition() {
        let cal = StudyCalendar::default();
        // Spring forward: 2024-03-10 is a 23 hour day in Los Angeles
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let (start, end) = cal.day_bounds(date);
        assert_eq!(end - start, Duration::hours(23));
    }

    #[test]
    fn parse_civil_date_accepts_both_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(parse_civil_date("d", "2024-02-29").unwrap(), expected);
        assert_eq!(parse_civil_date("d", "20240229").unwrap(), expected);
        assert_eq!(
            parse_civil_date("stage2_completed_on", "Feb 29"),
            Err(ValidationError::InvalidDate {
                field: "stage2_completed_on".into(),
                value: "Feb 29".into(),
            })
        );
    }
}
