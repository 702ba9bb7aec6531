//! Participant adherence status.
//!
//! This module maps (now, participant start, stage, event history) to a
//! traffic-light [`Tier`]:
//! - **Baseline**: finished sets against one set per elapsed day
//! - **Stage 2**: daily breathing segments plus Lumosity engagement
//! - **Stage 3**: six breathing segments per day plus Lumosity engagement
//!
//! The functions in the submodules are pure; [`StatusService`] fetches their
//! inputs through [`crate::data::StudyData`].

mod baseline;
mod calendar;
mod lumosity;
mod rules;
mod service;
mod tier;
mod training;

pub use baseline::{
    baseline_status, baseline_tier, finished_count, BaselineMode, SETS_PER_BASELINE,
};
pub use calendar::{elapsed_days, parse_civil_date, StudyCalendar, DEFAULT_TIMEZONE};
pub use lumosity::{lumosity_tier, qualifying_days, tier_for_qualifying_days};
pub use rules::StudyRules;
pub use service::StatusService;
pub use tier::{StatusResult, Tier};
pub use training::{stage2_breathing_tier, stage2_status, stage3_breathing_tier, stage3_status};
