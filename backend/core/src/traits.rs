use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{PersistedRecord, SubjectId};

/// Durable per-subject storage behind the ledger.
///
/// The store is eventually consistent with the ledger and may fail
/// transiently; callers log and move on.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name for logging (e.g. "sqlite").
    fn name(&self) -> &str;

    /// Every persisted record, used for startup reconciliation.
    async fn read_all(&self) -> Result<Vec<(SubjectId, PersistedRecord)>>;

    /// A single record, used as a miss fallback for cold subjects.
    async fn read_one(&self, subject: &SubjectId) -> Result<Option<PersistedRecord>>;

    /// Merge `patch` into the stored row for `subject`, creating it if needed.
    ///
    /// Presentation fields are only written when present in the patch and
    /// day buckets are merged key by key; nothing else at the store is touched.
    async fn upsert_merge(&self, subject: &SubjectId, patch: &PersistedRecord) -> Result<()>;
}

/// Source of "now" for the accrual ticker.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to (tests, replays).
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(t0);
        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(clock.now(), t0 + chrono::Duration::seconds(90));
        clock.set(t0);
        assert_eq!(clock.now(), t0);
    }
}
