use chrono::{DateTime, Duration, TimeZone, Utc};
use heartbeam_core::status::{
    baseline_tier, lumosity_tier, stage2_breathing_tier, stage3_breathing_tier,
    tier_for_qualifying_days,
};
use heartbeam_core::{EventRecord, StudyCalendar, StudyRules, Tier};
use proptest::prelude::*;

// 2024-06-20 19:00 UTC is noon in Los Angeles
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 20, 19, 0, 0).unwrap()
}

/// Five past days of plays: (plays that day, minute offsets within the day).
fn play_days_strategy() -> impl Strategy<Value = Vec<Vec<i64>>> {
    proptest::collection::vec(proptest::collection::vec(0i64..1440, 0..10), 5)
}

fn plays_for(days: &[Vec<i64>], calendar: &StudyCalendar) -> Vec<EventRecord> {
    let today = calendar.today(now());
    days.iter()
        .enumerate()
        .flat_map(|(i, minutes)| {
            let day = today - Duration::days(i as i64 + 1);
            let midnight = calendar.local_midnight(day);
            minutes
                .iter()
                .map(move |&m| EventRecord::lumosity_play(midnight + Duration::minutes(m)))
        })
        .collect()
}

proptest! {
    #[test]
    fn grace_period_is_always_green(elapsed in -3i64..=1, done in 0usize..100) {
        prop_assert_eq!(baseline_tier(elapsed, done), Tier::Green);
        prop_assert_eq!(stage2_breathing_tier(elapsed, done), Tier::Green);
        prop_assert_eq!(stage3_breathing_tier(elapsed, done, 6), Tier::Green);
        prop_assert_eq!(tier_for_qualifying_days(done, elapsed), Tier::Green);
    }

    #[test]
    fn more_work_never_lowers_the_tier(elapsed in 0i64..60, a in 0usize..80, b in 0usize..80) {
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assert!(baseline_tier(elapsed, lo).rank() <= baseline_tier(elapsed, hi).rank());
        prop_assert!(stage2_breathing_tier(elapsed, lo).rank() <= stage2_breathing_tier(elapsed, hi).rank());
        prop_assert!(stage3_breathing_tier(elapsed, lo, 6).rank() <= stage3_breathing_tier(elapsed, hi, 6).rank());
        prop_assert!(tier_for_qualifying_days(lo, elapsed).rank() <= tier_for_qualifying_days(hi, elapsed).rank());
    }

    #[test]
    fn lumosity_depends_only_on_full_days(days in play_days_strategy(), elapsed in 2i64..30) {
        let calendar = StudyCalendar::default();
        let rules = StudyRules::default();
        let plays = plays_for(&days, &calendar);
        let full_days = days.iter().filter(|d| d.len() >= 6).count();

        let tier = lumosity_tier(&plays, elapsed, now(), &calendar, &rules);
        prop_assert_eq!(tier, tier_for_qualifying_days(full_days, elapsed));

        let mut reversed = plays.clone();
        reversed.reverse();
        prop_assert_eq!(lumosity_tier(&reversed, elapsed, now(), &calendar, &rules), tier);
    }
}
