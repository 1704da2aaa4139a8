use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;

use voxledger_core::{PersistedRecord, RecordStore, SubjectId};

/// Process-local record store.
///
/// Used for ephemeral runs and tests: it counts effectful writes, keeps a
/// write log, and can be told to fail reads or writes.
#[derive(Default)]
pub struct InMemoryRecordStore {
    rows: Arc<RwLock<HashMap<SubjectId, PersistedRecord>>>,
    write_log: RwLock<Vec<(SubjectId, PersistedRecord)>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store, bypassing write accounting.
    pub fn with_records(records: impl IntoIterator<Item = (SubjectId, PersistedRecord)>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.rows.write().unwrap_or_else(|e| e.into_inner());
            rows.extend(records);
        }
        store
    }

    /// Number of successful `upsert_merge` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Successful writes for one subject, oldest first.
    pub fn writes_for(&self, subject: &SubjectId) -> Vec<PersistedRecord> {
        self.write_log
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(id, _)| id == subject)
            .map(|(_, rec)| rec.clone())
            .collect()
    }

    pub fn get(&self, subject: &SubjectId) -> Option<PersistedRecord> {
        self.rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(subject)
            .cloned()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_all(&self) -> Result<Vec<(SubjectId, PersistedRecord)>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("in-memory store configured to fail reads");
        }
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }

    async fn read_one(&self, subject: &SubjectId) -> Result<Option<PersistedRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("in-memory store configured to fail reads");
        }
        Ok(self.get(subject))
    }

    async fn upsert_merge(&self, subject: &SubjectId, patch: &PersistedRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("in-memory store configured to fail writes");
        }
        {
            let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
            let row = rows.entry(subject.clone()).or_default();
            if patch.display_name.is_some() {
                row.display_name = patch.display_name.clone();
            }
            if patch.avatar_ref.is_some() {
                row.avatar_ref = patch.avatar_ref.clone();
            }
            for (day, seconds) in &patch.daily_seconds {
                let bucket = row.daily_seconds.entry(day.clone()).or_insert(0);
                *bucket = (*bucket).max(*seconds);
            }
            row.total_seconds = patch.total_seconds.max(row.daily_seconds.values().sum());
        }
        self.write_log
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((subject.clone(), patch.clone()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(day: &str, secs: u64) -> PersistedRecord {
        PersistedRecord {
            display_name: None,
            avatar_ref: None,
            total_seconds: secs,
            daily_seconds: [(day.to_string(), secs)].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_counts_successful_writes_only() {
        let store = InMemoryRecordStore::new();
        let id = SubjectId::new("1");
        store.upsert_merge(&id, &patch("2026-10-19", 5)).await.unwrap();

        store.set_fail_writes(true);
        assert!(store.upsert_merge(&id, &patch("2026-10-19", 9)).await.is_err());
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get(&id).unwrap().total_seconds, 5);

        store.set_fail_writes(false);
        store.upsert_merge(&id, &patch("2026-10-19", 9)).await.unwrap();
        assert_eq!(store.writes_for(&id).len(), 2);
        assert_eq!(store.get(&id).unwrap().total_seconds, 9);
    }

    #[tokio::test]
    async fn test_merge_keeps_larger_bucket() {
        let id = SubjectId::new("1");
        let store = InMemoryRecordStore::with_records([(id.clone(), patch("2026-10-19", 1_000))]);
        store.upsert_merge(&id, &patch("2026-10-19", 30)).await.unwrap();
        store.upsert_merge(&id, &patch("2026-10-20", 7)).await.unwrap();

        let row = store.get(&id).unwrap();
        assert_eq!(row.daily_seconds.get("2026-10-19"), Some(&1_000));
        assert_eq!(row.daily_seconds.get("2026-10-20"), Some(&7));
        assert_eq!(row.total_seconds, 1_007);
    }

    #[tokio::test]
    async fn test_failing_reads() {
        let store = InMemoryRecordStore::with_records([(SubjectId::new("1"), patch("2026-10-19", 1))]);
        assert_eq!(store.read_all().await.unwrap().len(), 1);
        store.set_fail_reads(true);
        assert!(store.read_all().await.is_err());
        assert!(store.read_one(&SubjectId::new("1")).await.is_err());
    }
}
