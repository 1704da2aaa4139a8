use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Presentation, SubjectId};

/// A voice presence change reported by the event source.
///
/// Delivery is at-least-once and may arrive out of time order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub subject_id: SubjectId,
    pub previous_channel: Option<String>,
    pub new_channel: Option<String>,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub presentation: Presentation,
}

/// What a presence event means for a subject, judged from the channels alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceChange {
    Join,
    Switch,
    Leave,
    /// Same channel on both sides, or no channel on either.
    Unchanged,
}

impl PresenceEvent {
    pub fn new(
        subject_id: impl Into<SubjectId>,
        previous_channel: Option<&str>,
        new_channel: Option<&str>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            previous_channel: previous_channel.map(String::from),
            new_channel: new_channel.map(String::from),
            observed_at,
            presentation: Presentation::default(),
        }
    }

    pub fn with_presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn change(&self) -> PresenceChange {
        match (&self.previous_channel, &self.new_channel) {
            (None, Some(_)) => PresenceChange::Join,
            (Some(prev), Some(next)) if prev != next => PresenceChange::Switch,
            (Some(_), None) => PresenceChange::Leave,
            _ => PresenceChange::Unchanged,
        }
    }
}

impl std::fmt::Display for PresenceChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}
