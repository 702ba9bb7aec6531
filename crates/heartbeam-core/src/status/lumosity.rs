//! Lumosity engagement classification.
//!
//! Plays are bucketed by calendar day over a trailing window that ends
//! yesterday; plays are never available for the current day, so today is
//! always excluded. A **qualifying day** has at least
//! `lumosity_min_plays_per_day` plays.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::calendar::StudyCalendar;
use super::rules::StudyRules;
use super::tier::Tier;
use crate::events::{EventKind, EventRecord};

/// Count calendar days in the trailing window with enough plays.
///
/// The window's lower bound is the instant `now - lookback_days`; its upper
/// bound is the start of today in the study timezone.
pub fn qualifying_days(
    plays: &[EventRecord],
    now: DateTime<Utc>,
    calendar: &StudyCalendar,
    rules: &StudyRules,
) -> usize {
    let since = now - Duration::days(rules.lumosity_lookback_days);
    let today = calendar.today(now);

    let mut by_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for play in plays
        .iter()
        .filter(|p| p.kind == EventKind::LumosityPlay && p.occurred_at >= since)
    {
        let day = calendar.day_bucket(play.occurred_at);
        if day < today {
            *by_day.entry(day).or_insert(0) += 1;
        }
    }

    by_day
        .values()
        .filter(|&&count| count >= rules.lumosity_min_plays_per_day)
        .count()
}

/// Tier from a qualifying-day count, conditioned on elapsed days.
///
/// Participants in their first three days are never marked red.
pub fn tier_for_qualifying_days(qualifying: usize, elapsed_days: i64) -> Tier {
    if elapsed_days <= 1 {
        Tier::Green
    } else if elapsed_days <= 3 {
        if qualifying < 2 {
            Tier::Yellow
        } else {
            Tier::Green
        }
    } else if qualifying >= 4 {
        Tier::Green
    } else if qualifying >= 2 {
        Tier::Yellow
    } else {
        Tier::Red
    }
}

/// Classify Lumosity engagement.
pub fn lumosity_tier(
    plays: &[EventRecord],
    elapsed_days: i64,
    now: DateTime<Utc>,
    calendar: &StudyCalendar,
    rules: &StudyRules,
) -> Tier {
    if elapsed_days <= 1 {
        return Tier::Green;
    }
    let qualifying = qualifying_days(plays, now, calendar, rules);
    let tier = tier_for_qualifying_days(qualifying, elapsed_days);
    tracing::debug!(qualifying, elapsed_days, %tier, "lumosity tier");
    tier
}
