//! Reminder planning.
//!
//! Decides who should get which reminder on a given run. Delivery is left to
//! the caller: a plan lists recipients with their address on the requested
//! channel, plus baseline completions the caller should persist.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::eligibility::{finished_sets_complete, has_done_set_today};
use super::ParticipantDirectory;
use crate::data::StudyData;
use crate::error::{DataError, Result, ValidationError};
use crate::events::EventRecord;
use crate::participant::Participant;
use crate::status::{BaselineMode, StudyCalendar, StudyRules};

/// Delivery channel for a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl std::str::FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            other => Err(ValidationError::InvalidValue {
                field: "channel".into(),
                message: format!("expected 'email' or 'sms', got '{other}'"),
            }),
        }
    }
}

/// Which reminder job to plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReminderKind {
    PreBaseline,
    PostBaseline,
    HomeTraining,
    StartTomorrow,
    /// Admonish participants who replayed a Lumosity game yesterday
    NoMultiLumos,
}

impl std::str::FromStr for ReminderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pre-baseline" => Ok(ReminderKind::PreBaseline),
            "post-baseline" => Ok(ReminderKind::PostBaseline),
            "home-training" => Ok(ReminderKind::HomeTraining),
            "start-tomorrow" => Ok(ReminderKind::StartTomorrow),
            "no-multi-lumos" => Ok(ReminderKind::NoMultiLumos),
            other => Err(ValidationError::InvalidValue {
                field: "reminder kind".into(),
                message: format!(
                    "expected one of pre-baseline, post-baseline, home-training, start-tomorrow, no-multi-lumos; got '{other}'"
                ),
            }),
        }
    }
}

/// Message a recipient should be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReminderMessage {
    DailyBaseline,
    HomeTraining,
    Stage3Training,
    StartTomorrow,
    NoMultiLumos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    /// Email address or E.164 phone number, matching the plan's channel
    pub address: String,
    pub message: ReminderMessage,
}

/// A baseline the participant has just been found to complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub user_id: String,
    pub mode: BaselineMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPlan {
    pub kind: ReminderKind,
    pub channel: Channel,
    pub recipients: Vec<Recipient>,
    /// Completions to persist on the participant record
    pub completed: Vec<Completion>,
    /// Human ids of participants who just finished the post-training
    /// baseline, for the study-admin notice
    pub just_finished: Vec<String>,
}

impl ReminderPlan {
    fn new(kind: ReminderKind, channel: Channel) -> Self {
        Self {
            kind,
            channel,
            recipients: Vec::new(),
            completed: Vec::new(),
            just_finished: Vec::new(),
        }
    }

    /// Add `participant` unless they have dropped out or cannot be reached
    /// on the plan's channel.
    fn remind(&mut self, participant: &Participant, message: ReminderMessage) {
        if participant.is_dropped() {
            tracing::debug!(user_id = %participant.user_id, "skipping dropped participant");
            return;
        }
        let address = match self.channel {
            Channel::Email => participant.email.clone().filter(|e| !e.is_empty()),
            Channel::Sms => participant
                .can_receive_sms()
                .then(|| participant.phone_number.clone())
                .flatten(),
        };
        match address {
            Some(address) => self.recipients.push(Recipient {
                user_id: participant.user_id.clone(),
                address,
                message,
            }),
            None => tracing::debug!(
                user_id = %participant.user_id,
                channel = ?self.channel,
                "no deliverable address"
            ),
        }
    }
}

/// Plans reminder runs against a participant directory and event store.
pub struct ReminderPlanner<'a, D>
where
    D: StudyData + ParticipantDirectory + ?Sized,
{
    data: &'a D,
    calendar: StudyCalendar,
    rules: StudyRules,
    now: Option<DateTime<Utc>>,
}

impl<'a, D> ReminderPlanner<'a, D>
where
    D: StudyData + ParticipantDirectory + ?Sized,
{
    pub fn new(data: &'a D, calendar: StudyCalendar, rules: StudyRules) -> Self {
        Self {
            data,
            calendar,
            rules,
            now: None,
        }
    }

    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    pub fn plan(&self, kind: ReminderKind, channel: Channel) -> Result<ReminderPlan> {
        let now = self.now();
        let plan = match kind {
            ReminderKind::PreBaseline => self.plan_baseline(BaselineMode::Pre, channel, now)?,
            ReminderKind::PostBaseline => self.plan_baseline(BaselineMode::Post, channel, now)?,
            ReminderKind::HomeTraining => self.plan_home_training(channel, now)?,
            ReminderKind::StartTomorrow => self.plan_start_tomorrow(channel, now)?,
            ReminderKind::NoMultiLumos => self.plan_no_multi_lumos(channel, now)?,
        };
        tracing::info!(
            kind = ?kind,
            channel = ?channel,
            recipients = plan.recipients.len(),
            completed = plan.completed.len(),
            "reminder plan ready"
        );
        Ok(plan)
    }

    /// Completion check against the store: cheap record count first, then
    /// the finished sets stored under the participant's result identity.
    fn baseline_done(
        &self,
        participant: &Participant,
        sets: &[EventRecord],
        mode: BaselineMode,
    ) -> std::result::Result<bool, DataError> {
        if sets.len() < mode.min_set_records() {
            return Ok(false);
        }
        let finished = self.data.get_finished_sets(participant.result_identity())?;
        Ok(finished_sets_complete(&finished, mode))
    }

    fn plan_baseline(
        &self,
        mode: BaselineMode,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<ReminderPlan> {
        let kind = match mode {
            BaselineMode::Pre => ReminderKind::PreBaseline,
            BaselineMode::Post => ReminderKind::PostBaseline,
        };
        let mut plan = ReminderPlan::new(kind, channel);

        for participant in self.data.baseline_incomplete(mode)? {
            match mode {
                BaselineMode::Pre => {
                    let not_started = participant
                        .start_date
                        .is_some_and(|d| self.calendar.local_midnight(d) > now);
                    if not_started {
                        continue;
                    }
                }
                BaselineMode::Post => {
                    if !participant.home_complete {
                        continue;
                    }
                }
            }

            let sets = self.data.get_sets_for_user(&participant.user_id)?;
            if self.baseline_done(&participant, &sets, mode)? {
                plan.completed.push(Completion {
                    user_id: participant.user_id.clone(),
                    mode,
                });
                if mode == BaselineMode::Post {
                    plan.just_finished.push(
                        participant
                            .human_id
                            .clone()
                            .unwrap_or_else(|| participant.user_id.clone()),
                    );
                }
            } else if !has_done_set_today(&sets, now, &self.calendar) {
                plan.remind(&participant, ReminderMessage::DailyBaseline);
            }
        }
        Ok(plan)
    }

    fn plan_home_training(&self, channel: Channel, now: DateTime<Utc>) -> Result<ReminderPlan> {
        let mut plan = ReminderPlan::new(ReminderKind::HomeTraining, channel);
        let (today_start, today_end) = self.calendar.day_bounds(self.calendar.today(now));

        for participant in self.data.home_training_in_progress()? {
            let segments: Vec<EventRecord> = match participant.human_id.as_deref() {
                Some(human_id) => self
                    .data
                    .segments_for_user(human_id, Some(today_start))?
                    .into_iter()
                    .filter(|s| s.segment_end() < today_end)
                    .collect(),
                None => Vec::new(),
            };

            let Some(latest) = segments.iter().max_by_key(|s| s.segment_end()) else {
                plan.remind(&participant, ReminderMessage::HomeTraining);
                continue;
            };

            let stages: BTreeSet<u8> = segments.iter().filter_map(|s| s.stage).collect();
            if stages.len() > 1 {
                tracing::warn!(
                    user_id = %participant.user_id,
                    ?stages,
                    "more than one training stage recorded today"
                );
            }

            // Stage 1 and 2 need a single segment per day, so any segment today
            // means they are done.
            if latest.stage == Some(3) && segments.len() < self.rules.stage3_daily_segments {
                plan.remind(&participant, ReminderMessage::Stage3Training);
            }
        }
        Ok(plan)
    }

    fn plan_start_tomorrow(&self, channel: Channel, now: DateTime<Utc>) -> Result<ReminderPlan> {
        let mut plan = ReminderPlan::new(ReminderKind::StartTomorrow, channel);
        let Some(tomorrow) = self.calendar.today(now).succ_opt() else {
            return Ok(plan);
        };
        for participant in self.data.starting_on(tomorrow)? {
            plan.remind(&participant, ReminderMessage::StartTomorrow);
        }
        Ok(plan)
    }

    /// Email-only: there is no SMS version of this message.
    fn plan_no_multi_lumos(&self, channel: Channel, now: DateTime<Utc>) -> Result<ReminderPlan> {
        if channel != Channel::Email {
            return Err(ValidationError::InvalidValue {
                field: "channel".into(),
                message: "no-multi-lumos reminders are only sent by email".into(),
            }
            .into());
        }
        let mut plan = ReminderPlan::new(ReminderKind::NoMultiLumos, channel);
        let Some(yesterday) = self.calendar.today(now).pred_opt() else {
            return Ok(plan);
        };
        let (from, to) = self.calendar.day_bounds(yesterday);
        for user_id in self.data.repeat_lumos_players(from, to)? {
            let participant = self.data.get_user(&user_id)?;
            plan.remind(&participant, ReminderMessage::NoMultiLumos);
        }
        Ok(plan)
    }
}
