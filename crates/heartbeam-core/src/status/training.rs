//! Home-training status: breathing segments combined with Lumosity.
//!
//! - **Stage 2** starts at the participant's first (stage 1) segment and
//!   expects one segment per day after it
//! - **Stage 3** starts when stage 2 was completed and expects
//!   `stage3_segments_per_day` segments per day, judged over a trailing window

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::calendar::{elapsed_days, StudyCalendar};
use super::lumosity::lumosity_tier;
use super::rules::StudyRules;
use super::tier::{daily_quota_tier, StatusResult, Tier};
use crate::events::EventRecord;

/// Stage 2 breathing tier: one segment per elapsed day after the first.
pub fn stage2_breathing_tier(elapsed_days: i64, segs_done: usize) -> Tier {
    daily_quota_tier(elapsed_days, segs_done)
}

/// Stage 3 breathing tier.
///
/// From day 4 on the thresholds stay at four and three days' worth of
/// segments, since only the trailing window is counted.
pub fn stage3_breathing_tier(elapsed_days: i64, segs_done: usize, per_day: u32) -> Tier {
    let per_day = u64::from(per_day);
    let done = segs_done as u64;
    if elapsed_days <= 1 {
        Tier::Green
    } else if elapsed_days <= 3 {
        let expected = per_day * (elapsed_days as u64 - 1);
        if done >= expected {
            Tier::Green
        } else {
            Tier::Yellow
        }
    } else if done >= per_day * 4 {
        Tier::Green
    } else if done >= per_day * 3 {
        Tier::Yellow
    } else {
        Tier::Red
    }
}

/// Stage 2 status from all of a participant's segments and recent plays.
///
/// Returns a gray result when no segment exists: the participant has not
/// had the stage 1 lab visit yet.
pub fn stage2_status(
    segments: &[EventRecord],
    plays: &[EventRecord],
    now: DateTime<Utc>,
    calendar: &StudyCalendar,
    rules: &StudyRules,
) -> StatusResult {
    let Some(started) = segments.iter().map(EventRecord::segment_end).min() else {
        return StatusResult::blocked();
    };

    let elapsed = elapsed_days(now, started);
    // The stage 1 segment does not count toward stage 2.
    let segs_done = segments.len() - 1;
    let breathing = stage2_breathing_tier(elapsed, segs_done);
    let lumosity = lumosity_tier(plays, elapsed, now, calendar, rules);

    tracing::debug!(elapsed, segs_done, %breathing, %lumosity, "stage 2 tiers");
    StatusResult::training(lumosity, breathing)
}

/// Stage 3 status.
///
/// `segments` may include older or non-stage-3 segments; only stage 3
/// segments that ended within the trailing window are counted.
pub fn stage3_status(
    stage2_completed_on: NaiveDate,
    segments: &[EventRecord],
    plays: &[EventRecord],
    now: DateTime<Utc>,
    calendar: &StudyCalendar,
    rules: &StudyRules,
) -> StatusResult {
    let started = calendar.local_midnight(stage2_completed_on);
    let elapsed = elapsed_days(now, started);
    let window_start = now - Duration::days(rules.stage3_window_days);

    let segs_done = segments
        .iter()
        .filter(|s| s.stage == Some(3) && s.segment_end() >= window_start)
        .count();
    let breathing = stage3_breathing_tier(elapsed, segs_done, rules.stage3_segments_per_day);
    let lumosity = lumosity_tier(plays, elapsed, now, calendar, rules);

    tracing::debug!(elapsed, segs_done, %breathing, %lumosity, "stage 3 tiers");
    StatusResult::training(lumosity, breathing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2024-06-20 19:00 UTC is noon in Los Angeles
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 19, 0, 0).unwrap()
    }

    fn stage2_segments(start_days_ago: i64, extra: usize) -> Vec<EventRecord> {
        let first = (now() - Duration::days(start_days_ago)).timestamp();
        std::iter::once(EventRecord::breathing_segment(1, first))
            .chain((0..extra).map(|i| EventRecord::breathing_segment(2, first + 3600 * (i as i64 + 1))))
            .collect()
    }

    fn stage3_segments(count: usize) -> Vec<EventRecord> {
        (0..count)
            .map(|i| EventRecord::breathing_segment(3, (now() - Duration::hours(i as i64 + 1)).timestamp()))
            .collect()
    }

    fn lumos_days(days: i64) -> Vec<EventRecord> {
        (1..=days)
            .flat_map(|d| {
                (0..6).map(move |i| EventRecord::lumosity_play(now() - Duration::days(d) + Duration::minutes(i)))
            })
            .collect()
    }

    fn stage2(start_days_ago: i64, extra: usize, plays: &[EventRecord]) -> StatusResult {
        stage2_status(
            &stage2_segments(start_days_ago, extra),
            plays,
            now(),
            &StudyCalendar::default(),
            &StudyRules::default(),
        )
    }

    fn stage3(start_days_ago: i64, segs: usize, plays: &[EventRecord]) -> StatusResult {
        let completed = StudyCalendar::default().today(now()) - Duration::days(start_days_ago);
        stage3_status(
            completed,
            &stage3_segments(segs),
            plays,
            now(),
            &StudyCalendar::default(),
            &StudyRules::default(),
        )
    }

    #[test]
    fn stage2_gray_without_segments() {
        let result = stage2_status(&[], &lumos_days(5), now(), &StudyCalendar::default(), &StudyRules::default());
        assert_eq!(result, StatusResult::blocked());
    }

    #[test]
    fn stage2_breathing_conditions() {
        let cases = [
            (0, 0, Tier::Green),
            (2, 1, Tier::Green),
            (2, 0, Tier::Yellow),
            (3, 2, Tier::Green),
            (3, 1, Tier::Yellow),
            (4, 3, Tier::Green),
            (4, 2, Tier::Yellow),
            (4, 1, Tier::Red),
            (5, 2, Tier::Red),
        ];
        let plays = lumos_days(5);
        for (days_ago, segs_done, expected) in cases {
            let result = stage2(days_ago, segs_done, &plays);
            assert_eq!(result.breathing, Some(expected), "{days_ago} days, {segs_done} segs");
            assert_eq!(result.lumosity, Some(Tier::Green));
            assert_eq!(result.overall, expected);
        }
    }

    #[test]
    fn stage2_overall_takes_worst_of_lumosity() {
        let result = stage2(10, 9, &lumos_days(1));
        assert_eq!(result.breathing, Some(Tier::Green));
        assert_eq!(result.lumosity, Some(Tier::Red));
        assert_eq!(result.overall, Tier::Red);

        let result = stage2(10, 8, &lumos_days(3));
        assert_eq!(result.breathing, Some(Tier::Yellow));
        assert_eq!(result.lumosity, Some(Tier::Yellow));
        assert_eq!(result.overall, Tier::Yellow);
    }

    #[test]
    fn stage2_start_is_earliest_segment_regardless_of_order() {
        let mut segments = stage2_segments(4, 2);
        segments.reverse();
        let result = stage2_status(&segments, &lumos_days(5), now(), &StudyCalendar::default(), &StudyRules::default());
        assert_eq!(result.breathing, Some(Tier::Yellow));
    }

    #[test]
    fn stage3_breathing_conditions() {
        let cases = [
            (0, 1, Tier::Green),
            (2, 12, Tier::Green),
            (2, 6, Tier::Green),
            (2, 5, Tier::Yellow),
            (3, 12, Tier::Green),
            (3, 6, Tier::Yellow),
            (4, 24, Tier::Green),
            (4, 18, Tier::Yellow),
            (4, 12, Tier::Red),
            (27, 24, Tier::Green),
            (27, 17, Tier::Red),
        ];
        let plays = lumos_days(5);
        for (days_ago, segs, expected) in cases {
            let result = stage3(days_ago, segs, &plays);
            assert_eq!(result.breathing, Some(expected), "{days_ago} days, {segs} segs");
            assert_eq!(result.overall, expected);
        }
    }

    #[test]
    fn stage3_counts_only_recent_stage3_segments() {
        let mut segments = stage3_segments(18);
        // Outside the five-day window
        segments.extend((0..6).map(|i| {
            EventRecord::breathing_segment(3, (now() - Duration::days(6) - Duration::hours(i)).timestamp())
        }));
        // Wrong stage
        segments.extend((0..6).map(|i| {
            EventRecord::breathing_segment(2, (now() - Duration::hours(30 + i)).timestamp())
        }));
        let completed = StudyCalendar::default().today(now()) - Duration::days(10);
        let result = stage3_status(
            completed,
            &segments,
            &lumos_days(5),
            now(),
            &StudyCalendar::default(),
            &StudyRules::default(),
        );
        assert_eq!(result.breathing, Some(Tier::Yellow));
    }

    #[test]
    fn stage3_lumosity_dominates_when_worse() {
        let result = stage3(10, 24, &lumos_days(0));
        assert_eq!(result.breathing, Some(Tier::Green));
        assert_eq!(result.lumosity, Some(Tier::Red));
        assert_eq!(result.overall, Tier::Red);
    }
}
