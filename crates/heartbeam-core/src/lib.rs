//! # HeartBEAM Core Library
//!
//! Adherence tracking for the HeartBEAM study. Participants complete a
//! cognitive-task baseline, several weeks of home breathing training with
//! Lumosity brain games, and a closing baseline. This library turns their
//! event history into traffic-light statuses for the study staff and decides
//! who needs a reminder.
//!
//! ## Architecture
//!
//! - **Status**: pure functions from (now, start, events) to a [`Tier`], plus
//!   [`StatusService`] which fetches the events through [`StudyData`]
//! - **Reminders**: completion and same-day predicates, and a
//!   [`ReminderPlanner`] that builds a reminder run
//! - **Storage**: SQLite-backed [`StudyDb`] and TOML-based [`Config`]
//!
//! All day-level reasoning happens on calendar days of the study timezone
//! (America/Los_Angeles unless configured otherwise).

pub mod data;
pub mod error;
pub mod events;
pub mod participant;
pub mod reminders;
pub mod status;
pub mod storage;

pub use data::{InMemoryStudyData, StudyData, StudySnapshot};
pub use error::{ConfigError, CoreError, DataError, ValidationError};
pub use events::{EventKind, EventRecord};
pub use participant::Participant;
pub use reminders::{
    has_completed_baseline, has_done_set_today, Channel, ParticipantDirectory, ReminderKind,
    ReminderPlan, ReminderPlanner,
};
pub use status::{BaselineMode, StatusResult, StatusService, StudyCalendar, StudyRules, Tier};
pub use storage::{Config, StudyDb};
