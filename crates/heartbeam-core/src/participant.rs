//! Study participant snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Progress key set when a participant withdraws from the study.
pub const PROGRESS_DROPPED: &str = "dropped";

/// A participant as read from the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    /// Identity-pool id under which task results are stored
    #[serde(default)]
    pub identity_id: Option<String>,
    /// Short human-readable id used by the breathing app
    #[serde(default)]
    pub human_id: Option<String>,
    /// Staff-assigned start date, a civil date in the study timezone.
    /// Takes precedence over `created_at` when computing elapsed time.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    /// Milestone name -> when it was reached
    #[serde(default)]
    pub progress: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub email: Option<String>,
    /// E.164 formatted
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub phone_number_verified: bool,
    #[serde(default)]
    pub pre_complete: bool,
    #[serde(default)]
    pub post_complete: bool,
    #[serde(default)]
    pub home_complete: bool,
}

impl Participant {
    pub fn new(user_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            identity_id: None,
            human_id: None,
            start_date: None,
            created_at,
            progress: BTreeMap::new(),
            email: None,
            phone_number: None,
            phone_number_verified: false,
            pre_complete: false,
            post_complete: false,
            home_complete: false,
        }
    }

    /// Identity under which finished sets are looked up.
    pub fn result_identity(&self) -> &str {
        self.identity_id.as_deref().unwrap_or(&self.user_id)
    }

    pub fn is_dropped(&self) -> bool {
        self.progress.contains_key(PROGRESS_DROPPED)
    }

    /// Whether an SMS can be sent to this participant.
    pub fn can_receive_sms(&self) -> bool {
        self.phone_number_verified && self.phone_number.as_deref().is_some_and(|p| !p.is_empty())
    }
}
