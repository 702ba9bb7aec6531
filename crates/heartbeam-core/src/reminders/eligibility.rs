//! Predicates that decide whether a baseline reminder is still needed.

use chrono::{DateTime, Utc};

use crate::events::{EventKind, EventRecord};
use crate::status::{BaselineMode, StudyCalendar};

/// Whether the finished sets of `mode` are exactly its six set numbers.
///
/// Post-training sets are compared after dropping sets 1-6. Pre-training
/// compares every finished set, so `[1, 2, 3, 4, 5, 6, 7]` is incomplete.
/// Duplicates never stand in for a missing set: `[1, 1, 2, 3, 4, 5]` is
/// incomplete, and so is `[1, 2, 3, 4, 5, 6, 6]`.
pub fn finished_sets_complete<'a, I>(finished: I, mode: BaselineMode) -> bool
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut nums: Vec<u8> = finished
        .into_iter()
        .filter(|r| r.kind == EventKind::SetFinished)
        .filter_map(|r| r.set_num)
        .filter(|&n| mode == BaselineMode::Pre || mode.contains(n))
        .collect();
    nums.sort_unstable();
    nums.into_iter().eq(mode.set_range())
}

/// Whether a participant has completed the `mode` baseline.
///
/// `set_records` are all of their started and finished set records.
pub fn has_completed_baseline(set_records: &[EventRecord], mode: BaselineMode) -> bool {
    if set_records.len() < mode.min_set_records() {
        return false;
    }
    finished_sets_complete(set_records, mode)
}

/// Whether a set was both started and finished on today's calendar day.
pub fn has_done_set_today(
    set_records: &[EventRecord],
    now: DateTime<Utc>,
    calendar: &StudyCalendar,
) -> bool {
    let today = calendar.today(now);
    let on_today = |kind: EventKind| {
        set_records
            .iter()
            .any(|r| r.kind == kind && calendar.day_bucket(r.occurred_at) == today)
    };
    on_today(EventKind::SetStarted) && on_today(EventKind::SetFinished)
}
