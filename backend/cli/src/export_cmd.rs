//! `voxledger export`: dump persisted records straight from the store.

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::Value;
use tracing::warn;

use voxledger_config::{StorageBackend, VoxLedgerConfig};
use voxledger_core::RecordStore;

use crate::serve::open_store;

pub async fn run(config: &VoxLedgerConfig) -> Result<()> {
    if config.storage.backend == StorageBackend::Memory {
        warn!("In-memory backend has nothing persisted to export");
    }
    let store = open_store(&config.storage)?;
    println!("{}", serde_json::to_string_pretty(&export(store.as_ref()).await?)?);
    Ok(())
}

/// Persisted records keyed by subject id.
pub async fn export(store: &dyn RecordStore) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for (subject, record) in store.read_all().await? {
        out.insert(subject.as_str().to_string(), serde_json::to_value(&record)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxledger_core::{PersistedRecord, SubjectId};
    use voxledger_store::InMemoryRecordStore;

    #[tokio::test]
    async fn test_export_keys_by_subject() {
        let store = InMemoryRecordStore::with_records([(
            SubjectId::new("11"),
            PersistedRecord {
                display_name: Some("ada".into()),
                avatar_ref: None,
                total_seconds: 42,
                daily_seconds: [("2026-10-19".to_string(), 42)].into_iter().collect(),
            },
        )]);
        let out = export(&store).await.unwrap();
        assert_eq!(out["11"]["total_seconds"], 42);
        assert_eq!(out["11"]["daily_seconds"]["2026-10-19"], 42);
    }
}
