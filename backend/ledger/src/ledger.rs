use std::collections::HashMap;

use tracing::debug;

use voxledger_core::{AccountingRecord, Presentation, SubjectId};

/// Authoritative in-memory accounting state, one record per subject.
///
/// Only the ledger actor holds a `Ledger`; every update is a whole-record
/// replacement so no reader can see a half-applied transition.
#[derive(Debug, Default)]
pub struct Ledger {
    records: HashMap<SubjectId, AccountingRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current record for `subject`, creating a zero-valued one from `hint`
    /// if the subject has never been seen.
    pub fn get(&mut self, subject: &SubjectId, hint: &Presentation) -> AccountingRecord {
        self.records
            .entry(subject.clone())
            .or_insert_with(|| {
                debug!(subject = %subject, "Creating ledger record");
                AccountingRecord::new(subject.clone(), hint)
            })
            .clone()
    }

    pub fn peek(&self, subject: &SubjectId) -> Option<&AccountingRecord> {
        self.records.get(subject)
    }

    /// Replace the record for its subject.
    pub fn upsert(&mut self, record: AccountingRecord) {
        self.records.insert(record.subject_id.clone(), record);
    }

    /// Install `record` unless the subject is already present.
    /// Returns the record that ends up in the ledger.
    pub fn seed_if_absent(&mut self, record: AccountingRecord) -> AccountingRecord {
        self.records
            .entry(record.subject_id.clone())
            .or_insert(record)
            .clone()
    }

    /// Load persisted records at startup. Every session is closed without
    /// credit because session boundaries are never persisted.
    pub fn load(&mut self, records: impl IntoIterator<Item = AccountingRecord>) -> usize {
        let mut loaded = 0;
        for mut record in records {
            record.end_session_without_credit();
            self.upsert(record);
            loaded += 1;
        }
        loaded
    }

    /// All records ordered by subject id.
    pub fn snapshot(&self) -> Vec<AccountingRecord> {
        let mut all: Vec<AccountingRecord> = self.records.values().cloned().collect();
        all.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        all
    }

    pub fn active_subjects(&self) -> Vec<SubjectId> {
        self.records
            .values()
            .filter(|r| r.is_active())
            .map(|r| r.subject_id.clone())
            .collect()
    }
}
