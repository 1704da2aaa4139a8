use tracing::{error, info, warn};

use voxledger_core::{AccountingRecord, RecordStore};

use crate::ledger::Ledger;

/// Build the startup ledger from the store.
///
/// Sessions interrupted by the restart are dropped without credit. If the
/// store cannot be read the ledger starts empty so the service still comes up.
pub async fn reconcile(store: &dyn RecordStore) -> Ledger {
    let mut ledger = Ledger::new();
    match store.read_all().await {
        Ok(rows) => {
            let records = rows.into_iter().map(|(subject, persisted)| {
                let record = AccountingRecord::from_persisted(subject, persisted);
                if !record.is_balanced() {
                    warn!(
                        subject = %record.subject_id,
                        total_seconds = record.total_seconds,
                        "Persisted total disagrees with day buckets"
                    );
                }
                record
            });
            let loaded = ledger.load(records);
            info!(backend = store.name(), records = loaded, "Voice data preloaded");
        }
        Err(e) => {
            error!(
                backend = store.name(),
                error = %e,
                "Could not read persisted voice data, starting with an empty ledger"
            );
        }
    }
    ledger
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxledger_core::{PersistedRecord, SubjectId};
    use voxledger_store::InMemoryRecordStore;

    fn persisted(total: u64) -> PersistedRecord {
        PersistedRecord {
            display_name: Some("ada".into()),
            avatar_ref: None,
            total_seconds: total,
            daily_seconds: [("2026-10-18".to_string(), total)].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_reconcile_loads_idle_records() {
        let store = InMemoryRecordStore::with_records([
            (SubjectId::new("1"), persisted(10)),
            (SubjectId::new("2"), persisted(20)),
        ]);
        let ledger = reconcile(&store).await;
        assert_eq!(ledger.len(), 2);
        assert!(ledger.active_subjects().is_empty());
        assert_eq!(ledger.peek(&SubjectId::new("2")).unwrap().total_seconds, 20);
    }

    #[tokio::test]
    async fn test_reconcile_survives_unreadable_store() {
        let store = InMemoryRecordStore::with_records([(SubjectId::new("1"), persisted(10))]);
        store.set_fail_reads(true);
        let ledger = reconcile(&store).await;
        assert!(ledger.is_empty());
    }
}
