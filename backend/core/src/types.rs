use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a tracked subject (a community member).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Presentation fields supplied by the identity provider alongside events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub display_name: Option<String>,
    pub avatar_ref: Option<String>,
}

impl Presentation {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
            avatar_ref: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_ref.is_none()
    }
}

/// Runtime accounting state of one subject.
///
/// `total_seconds` always equals the sum of `daily_seconds`. `session_start`
/// is set exactly while the subject is inside a tracked session, and
/// `last_accrual` is the accrual cursor for that session. Neither timestamp
/// is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingRecord {
    pub subject_id: SubjectId,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub total_seconds: u64,
    /// Keyed by `YYYY-MM-DD` in UTC.
    pub daily_seconds: BTreeMap<String, u64>,
    pub session_start: Option<DateTime<Utc>>,
    pub last_accrual: Option<DateTime<Utc>>,
}

impl AccountingRecord {
    /// A zero-valued, idle record.
    pub fn new(subject_id: SubjectId, presentation: &Presentation) -> Self {
        Self {
            display_name: presentation.display_name.clone().unwrap_or_default(),
            avatar_ref: presentation.avatar_ref.clone(),
            subject_id,
            total_seconds: 0,
            daily_seconds: BTreeMap::new(),
            session_start: None,
            last_accrual: None,
        }
    }

    /// Rebuild a record from its persisted shape. The result is always idle.
    pub fn from_persisted(subject_id: SubjectId, persisted: PersistedRecord) -> Self {
        Self {
            subject_id,
            display_name: persisted.display_name.unwrap_or_default(),
            avatar_ref: persisted.avatar_ref,
            total_seconds: persisted.total_seconds,
            daily_seconds: persisted.daily_seconds,
            session_start: None,
            last_accrual: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session_start.is_some()
    }

    pub fn seconds_on(&self, day: &str) -> u64 {
        self.daily_seconds.get(day).copied().unwrap_or(0)
    }

    /// Overwrite presentation fields the caller actually supplied.
    /// Returns true when anything changed.
    pub fn refresh_presentation(&mut self, presentation: &Presentation) -> bool {
        let mut changed = false;
        if let Some(name) = &presentation.display_name {
            if !name.is_empty() && *name != self.display_name {
                self.display_name = name.clone();
                changed = true;
            }
        }
        if let Some(avatar) = &presentation.avatar_ref {
            if self.avatar_ref.as_ref() != Some(avatar) {
                self.avatar_ref = Some(avatar.clone());
                changed = true;
            }
        }
        changed
    }

    /// Drop runtime session state (startup reconciliation).
    pub fn end_session_without_credit(&mut self) {
        self.session_start = None;
        self.last_accrual = None;
    }

    /// True when the total agrees with the sum of the day buckets.
    pub fn is_balanced(&self) -> bool {
        self.daily_seconds.values().sum::<u64>() == self.total_seconds
    }

    pub fn to_persisted(&self) -> PersistedRecord {
        PersistedRecord {
            display_name: if self.display_name.is_empty() {
                None
            } else {
                Some(self.display_name.clone())
            },
            avatar_ref: self.avatar_ref.clone(),
            total_seconds: self.total_seconds,
            daily_seconds: self.daily_seconds.clone(),
        }
    }
}

/// The per-subject shape held by the persistent store.
///
/// Used both as the full stored row and as a merge patch: `None`
/// presentation fields leave the stored value untouched, and day buckets are
/// merged key by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub display_name: Option<String>,
    pub avatar_ref: Option<String>,
    pub total_seconds: u64,
    #[serde(default)]
    pub daily_seconds: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_idle_and_balanced() {
        let rec = AccountingRecord::new("42".into(), &Presentation::named("ada"));
        assert_eq!(rec.display_name, "ada");
        assert!(!rec.is_active());
        assert!(rec.is_balanced());
        assert_eq!(rec.seconds_on("2026-01-01"), 0);
    }

    #[test]
    fn test_refresh_presentation_only_touches_supplied_fields() {
        let mut rec = AccountingRecord::new("42".into(), &Presentation::named("ada"));
        rec.avatar_ref = Some("a.png".into());

        assert!(!rec.refresh_presentation(&Presentation::default()));
        assert_eq!(rec.avatar_ref.as_deref(), Some("a.png"));

        assert!(rec.refresh_presentation(&Presentation::named("lovelace")));
        assert_eq!(rec.display_name, "lovelace");
        assert_eq!(rec.avatar_ref.as_deref(), Some("a.png"));
    }

    #[test]
    fn test_persisted_round_trip_drops_session() {
        let mut rec = AccountingRecord::new("7".into(), &Presentation::named("bob"));
        rec.total_seconds = 30;
        rec.daily_seconds.insert("2026-03-01".into(), 30);
        rec.session_start = Some(Utc::now());
        rec.last_accrual = rec.session_start;

        let restored = AccountingRecord::from_persisted("7".into(), rec.to_persisted());
        assert_eq!(restored.total_seconds, 30);
        assert_eq!(restored.display_name, "bob");
        assert!(restored.session_start.is_none());
        assert!(restored.last_accrual.is_none());
    }

    #[test]
    fn test_subject_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SubjectId::new("123")).unwrap();
        assert_eq!(json, "\"123\"");
    }
}
