//! Presence state machine.
//!
//! A subject is Idle (no `session_start`) or Active. Events move it between
//! the two and credit elapsed time through [`crate::accrual::credit`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use voxledger_core::{AccountingRecord, PresenceChange, PresenceEvent};

use crate::accrual::credit;
use crate::ledger::Ledger;

/// What an event did to its subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Idle → Active.
    Started,
    /// Active → Active across channels.
    Switched,
    /// Active → Idle.
    Ended,
    /// Join reported while already Active (duplicate delivery).
    Reanchored,
    /// Switch reported while Idle; the session is opened without credit.
    Resumed,
    /// Leave reported while Idle; nothing to credit.
    OrphanLeave,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub kind: TransitionKind,
    pub credited: u64,
    pub presentation_changed: bool,
    pub record: AccountingRecord,
}

impl TransitionOutcome {
    /// Whether the ledger changed in a way the store should see.
    pub fn needs_persist(&self) -> bool {
        self.presentation_changed
            || !matches!(
                self.kind,
                TransitionKind::OrphanLeave | TransitionKind::Ignored
            )
    }
}

/// Apply one presence event to the ledger.
pub fn apply(ledger: &mut Ledger, event: &PresenceEvent) -> TransitionOutcome {
    let mut record = ledger.get(&event.subject_id, &event.presentation);
    let presentation_changed = record.refresh_presentation(&event.presentation);
    let now = event.observed_at;
    let change = event.change();
    let mut credited = 0;

    let kind = match (change, record.is_active()) {
        (PresenceChange::Join, false) => {
            open_session(&mut record, now);
            info!(subject = %record.subject_id, name = %record.display_name, at = %now, "Joined voice");
            TransitionKind::Started
        }
        (PresenceChange::Join, true) => {
            credited = credit(&mut record, now);
            reanchor(&mut record, now);
            debug!(subject = %record.subject_id, credited, "Join while already active, session kept open");
            TransitionKind::Reanchored
        }
        (PresenceChange::Switch, true) => {
            credited = credit(&mut record, now);
            reanchor(&mut record, now);
            info!(subject = %record.subject_id, seconds = credited, "Switched channels");
            TransitionKind::Switched
        }
        (PresenceChange::Switch, false) => {
            open_session(&mut record, now);
            info!(subject = %record.subject_id, "Switch with no open session, tracking from now");
            TransitionKind::Resumed
        }
        (PresenceChange::Leave, true) => {
            credited = credit(&mut record, now);
            record.session_start = None;
            record.last_accrual = None;
            info!(
                subject = %record.subject_id,
                seconds = credited,
                total_seconds = record.total_seconds,
                "Left voice"
            );
            TransitionKind::Ended
        }
        (PresenceChange::Leave, false) => {
            warn!(subject = %record.subject_id, "Leave with no recorded session, nothing credited");
            TransitionKind::OrphanLeave
        }
        (PresenceChange::Unchanged, _) => TransitionKind::Ignored,
    };

    debug_assert!(record.is_balanced());
    ledger.upsert(record.clone());

    TransitionOutcome {
        kind,
        credited,
        presentation_changed,
        record,
    }
}

fn open_session(record: &mut AccountingRecord, now: DateTime<Utc>) {
    record.session_start = Some(now);
    record.last_accrual = Some(now);
}

/// Restart the session segment at `now` without letting the cursor go back.
fn reanchor(record: &mut AccountingRecord, now: DateTime<Utc>) {
    let anchor = record.last_accrual.map_or(now, |cursor| cursor.max(now));
    record.session_start = Some(anchor);
    record.last_accrual = Some(anchor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use voxledger_core::{day_key, Presentation, SubjectId};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn ev(prev: Option<&str>, next: Option<&str>, at: DateTime<Utc>) -> PresenceEvent {
        PresenceEvent::new("42", prev, next, at)
    }

    fn record(ledger: &Ledger) -> &AccountingRecord {
        ledger.peek(&SubjectId::new("42")).unwrap()
    }

    #[test]
    fn test_join_switch_leave_scenario() {
        let mut ledger = Ledger::new();
        let t0 = t(0);

        let join = apply(&mut ledger, &ev(None, Some("lobby"), t0));
        assert_eq!(join.kind, TransitionKind::Started);
        assert_eq!(record(&ledger).session_start, Some(t0));

        let switch = apply(&mut ledger, &ev(Some("lobby"), Some("games"), t(37)));
        assert_eq!(switch.kind, TransitionKind::Switched);
        assert_eq!(switch.credited, 37);
        assert_eq!(record(&ledger).session_start, Some(t(37)));

        let leave = apply(&mut ledger, &ev(Some("games"), None, t(95)));
        assert_eq!(leave.kind, TransitionKind::Ended);
        assert_eq!(leave.credited, 58);

        let rec = record(&ledger);
        assert_eq!(rec.seconds_on(&day_key(t0)), 95);
        assert_eq!(rec.total_seconds, 95);
        assert!(rec.session_start.is_none());
        assert!(rec.last_accrual.is_none());
    }

    #[test]
    fn test_leave_without_join_credits_nothing() {
        let mut ledger = Ledger::new();
        let out = apply(&mut ledger, &ev(Some("lobby"), None, t(10)));
        assert_eq!(out.kind, TransitionKind::OrphanLeave);
        assert_eq!(out.credited, 0);
        assert!(!out.needs_persist());
        assert_eq!(record(&ledger).total_seconds, 0);
    }

    #[test]
    fn test_duplicate_and_same_channel_events_are_ignored() {
        let mut ledger = Ledger::new();
        apply(&mut ledger, &ev(None, Some("lobby"), t(0)));
        let same = apply(&mut ledger, &ev(Some("lobby"), Some("lobby"), t(5)));
        assert_eq!(same.kind, TransitionKind::Ignored);
        assert_eq!(record(&ledger).total_seconds, 0);

        let idle = apply(&mut ledger, &ev(None, None, t(6)));
        assert_eq!(idle.kind, TransitionKind::Ignored);
    }

    #[test]
    fn test_duplicate_join_keeps_session_and_time() {
        let mut ledger = Ledger::new();
        apply(&mut ledger, &ev(None, Some("lobby"), t(0)));
        let dup = apply(&mut ledger, &ev(None, Some("lobby"), t(20)));
        assert_eq!(dup.kind, TransitionKind::Reanchored);
        assert_eq!(dup.credited, 20);
        apply(&mut ledger, &ev(Some("lobby"), None, t(30)));
        assert_eq!(record(&ledger).total_seconds, 30);
    }

    #[test]
    fn test_switch_while_idle_opens_session() {
        let mut ledger = Ledger::new();
        let out = apply(&mut ledger, &ev(Some("a"), Some("b"), t(0)));
        assert_eq!(out.kind, TransitionKind::Resumed);
        assert_eq!(out.credited, 0);
        apply(&mut ledger, &ev(Some("b"), None, t(12)));
        assert_eq!(record(&ledger).total_seconds, 12);
    }

    #[test]
    fn test_out_of_order_event_clamps_to_zero() {
        let mut ledger = Ledger::new();
        apply(&mut ledger, &ev(None, Some("a"), t(50)));
        let late = apply(&mut ledger, &ev(Some("a"), Some("b"), t(40)));
        assert_eq!(late.credited, 0);
        // The cursor stays at t(50), so a later leave credits from there.
        assert_eq!(record(&ledger).last_accrual, Some(t(50)));
        apply(&mut ledger, &ev(Some("b"), None, t(60)));
        assert_eq!(record(&ledger).total_seconds, 10);
    }

    #[test]
    fn test_replay_sums_well_formed_sessions() {
        let mut ledger = Ledger::new();
        let sessions = [(0, 30), (100, 160), (200, 201), (500, 800)];
        for (start, end) in sessions {
            apply(&mut ledger, &ev(None, Some("a"), t(start)));
            apply(&mut ledger, &ev(Some("a"), Some("b"), t((start + end) / 2)));
            apply(&mut ledger, &ev(Some("b"), None, t(end)));
            assert!(record(&ledger).is_balanced());
        }
        let expected: i64 = sessions.iter().map(|(s, e)| e - s).sum();
        assert_eq!(record(&ledger).total_seconds, expected as u64);
    }

    #[test]
    fn test_presentation_refresh_is_persisted_even_when_ignored() {
        let mut ledger = Ledger::new();
        apply(&mut ledger, &ev(None, Some("a"), t(0)));
        let out = apply(
            &mut ledger,
            &ev(Some("a"), Some("a"), t(1)).with_presentation(Presentation::named("ada")),
        );
        assert_eq!(out.kind, TransitionKind::Ignored);
        assert!(out.presentation_changed);
        assert!(out.needs_persist());
        assert_eq!(record(&ledger).display_name, "ada");
    }
}
