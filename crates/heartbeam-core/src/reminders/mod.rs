//! Reminder eligibility and planning.
//!
//! The eligibility predicates decide whether a participant still needs a
//! baseline reminder. [`ReminderPlanner`] runs a whole reminder job against
//! a [`ParticipantDirectory`].

mod eligibility;
mod planner;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::DataError;
use crate::participant::Participant;
use crate::status::BaselineMode;

pub use eligibility::{finished_sets_complete, has_completed_baseline, has_done_set_today};
pub use planner::{
    Channel, Completion, Recipient, ReminderKind, ReminderMessage, ReminderPlan, ReminderPlanner,
};

/// Participant queries needed by the reminder jobs.
pub trait ParticipantDirectory {
    /// Participants that have not completed the `mode` baseline.
    fn baseline_incomplete(&self, mode: BaselineMode) -> Result<Vec<Participant>, DataError>;

    /// Participants past the pre-training baseline but not done with home
    /// training.
    fn home_training_in_progress(&self) -> Result<Vec<Participant>, DataError>;

    fn starting_on(&self, date: NaiveDate) -> Result<Vec<Participant>, DataError>;

    /// User ids with more than one play of the same Lumosity game in
    /// `[from, to)`, ascending. Plays without a game name are ignored.
    fn repeat_lumos_players(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>, DataError>;
}
