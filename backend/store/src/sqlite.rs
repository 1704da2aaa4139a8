use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use voxledger_core::{PersistedRecord, RecordStore, SubjectId};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS voice_records (
        subject_id    TEXT PRIMARY KEY,
        display_name  TEXT,
        avatar_ref    TEXT,
        total_seconds INTEGER NOT NULL DEFAULT 0,
        daily_seconds TEXT NOT NULL DEFAULT '{}',
        updated_at    TEXT NOT NULL
    );";

/// SQLite-backed record store, one row per subject.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize voice_records schema")?;
        info!(path = %path.as_ref().display(), "Record store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Count stored subjects.
    pub async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM voice_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

type RawRow = (String, Option<String>, Option<String>, i64, String);

fn decode_row(subject: &str, raw: RawRow) -> Option<PersistedRecord> {
    let (_, display_name, avatar_ref, total, daily_json) = raw;
    let daily_seconds = match serde_json::from_str::<BTreeMap<String, u64>>(&daily_json) {
        Ok(map) => map,
        Err(e) => {
            warn!(subject = %subject, error = %e, "Skipping row with unreadable daily buckets");
            return None;
        }
    };
    Some(PersistedRecord {
        display_name,
        avatar_ref,
        total_seconds: total.max(0) as u64,
        daily_seconds,
    })
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn read_all(&self) -> Result<Vec<(SubjectId, PersistedRecord)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT subject_id, display_name, avatar_ref, total_seconds, daily_seconds
             FROM voice_records ORDER BY subject_id ASC",
        )?;

        let records = stmt
            .query_map([], read_raw)?
            .filter_map(|r| match r {
                Ok(raw) => Some(raw),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable voice record row");
                    None
                }
            })
            .filter_map(|raw| {
                let subject = raw.0.clone();
                decode_row(&subject, raw).map(|rec| (SubjectId::new(subject), rec))
            })
            .collect();

        Ok(records)
    }

    async fn read_one(&self, subject: &SubjectId) -> Result<Option<PersistedRecord>> {
        let conn = self.conn.lock().await;
        let raw = conn
            .query_row(
                "SELECT subject_id, display_name, avatar_ref, total_seconds, daily_seconds
                 FROM voice_records WHERE subject_id = ?1",
                params![subject.as_str()],
                read_raw,
            )
            .optional()?;
        Ok(raw.and_then(|raw| decode_row(subject.as_str(), raw)))
    }

    async fn upsert_merge(&self, subject: &SubjectId, patch: &PersistedRecord) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT daily_seconds FROM voice_records WHERE subject_id = ?1",
                params![subject.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let mut daily: BTreeMap<String, u64> = match existing {
            Some(json) => serde_json::from_str(&json).with_context(|| {
                format!("Stored daily buckets for {subject} are unreadable, refusing to overwrite")
            })?,
            None => BTreeMap::new(),
        };
        // A bucket never shrinks, even if the ledger started without the stored history.
        for (day, seconds) in &patch.daily_seconds {
            let bucket = daily.entry(day.clone()).or_insert(0);
            *bucket = (*bucket).max(*seconds);
        }
        let total = patch.total_seconds.max(daily.values().sum());
        let daily_json = serde_json::to_string(&daily)?;

        tx.execute(
            "INSERT INTO voice_records
                (subject_id, display_name, avatar_ref, total_seconds, daily_seconds, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(subject_id) DO UPDATE SET
                display_name  = COALESCE(excluded.display_name, voice_records.display_name),
                avatar_ref    = COALESCE(excluded.avatar_ref, voice_records.avatar_ref),
                total_seconds = excluded.total_seconds,
                daily_seconds = excluded.daily_seconds,
                updated_at    = excluded.updated_at",
            params![
                subject.as_str(),
                patch.display_name,
                patch.avatar_ref,
                total as i64,
                daily_json,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        debug!(subject = %subject, total_seconds = total, "Upserted voice record");
        Ok(())
    }
}
