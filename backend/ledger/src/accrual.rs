//! The accrual cursor and the periodic ticker that advances it.
//!
//! `credit` is the only code that moves `last_accrual` forward while a
//! session is open. Transitions and ticks both go through it, so a second of
//! presence is credited at most once no matter which path sees it first.

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use voxledger_core::{day_key, elapsed_whole_seconds, AccountingRecord, SubjectId};

use crate::ledger::Ledger;

/// Credit the whole seconds between the cursor and `now` to the total and to
/// the day bucket of `now`, then advance the cursor by exactly that amount.
///
/// Returns the seconds credited. Idle records and timestamps at or before
/// the cursor credit nothing.
pub fn credit(record: &mut AccountingRecord, now: DateTime<Utc>) -> u64 {
    let Some(cursor) = record.last_accrual else {
        return 0;
    };
    let seconds = elapsed_whole_seconds(cursor, now);
    if seconds == 0 {
        return 0;
    }

    record.total_seconds = record.total_seconds.saturating_add(seconds);
    let bucket = record.daily_seconds.entry(day_key(now)).or_insert(0);
    *bucket = bucket.saturating_add(seconds);
    record.last_accrual = Some(cursor + Duration::seconds(seconds as i64));
    seconds
}

/// Subjects credited by one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub credited: Vec<(SubjectId, u64)>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.credited.is_empty()
    }
}

/// Advance every active session up to `now`.
pub fn tick(ledger: &mut Ledger, now: DateTime<Utc>) -> TickReport {
    let mut report = TickReport::default();
    for subject in ledger.active_subjects() {
        let Some(current) = ledger.peek(&subject) else {
            continue;
        };
        let mut record = current.clone();
        let seconds = credit(&mut record, now);
        if seconds > 0 {
            trace!(subject = %subject, seconds, "Tick credit");
            ledger.upsert(record);
            report.credited.push((subject, seconds));
        }
    }
    report
}
