use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use voxledger_core::{format_hms, LedgerError, PersistedRecord, RecordStore, SubjectId};

/// Outcome of a flush.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
}

enum WriteJob {
    Write {
        subject: SubjectId,
        record: PersistedRecord,
    },
    Flush {
        batch: Vec<(SubjectId, PersistedRecord)>,
        done: oneshot::Sender<FlushReport>,
    },
}

/// Handle to the persistence writer task.
///
/// Jobs run strictly in submission order, so a flush acknowledges only after
/// every write queued before it has been attempted.
#[derive(Clone)]
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<WriteJob>,
}

impl PersistenceWriter {
    pub fn spawn(store: Arc<dyn RecordStore>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, rx));
        (Self { tx }, handle)
    }

    /// Queue a write without waiting for it.
    pub fn submit(&self, subject: SubjectId, record: PersistedRecord) {
        if self.tx.send(WriteJob::Write { subject, record }).is_err() {
            error!("Persistence writer has stopped, dropping write");
        }
    }

    /// Write `batch` and wait until it and everything queued earlier is done.
    pub async fn flush(
        &self,
        batch: Vec<(SubjectId, PersistedRecord)>,
    ) -> Result<FlushReport, LedgerError> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(WriteJob::Flush { batch, done })
            .map_err(|_| LedgerError::ActorClosed("persistence writer".into()))?;
        wait.await
            .map_err(|_| LedgerError::ActorClosed("persistence writer".into()))
    }
}

async fn run_writer(store: Arc<dyn RecordStore>, mut rx: mpsc::UnboundedReceiver<WriteJob>) {
    debug!(backend = store.name(), "Persistence writer started");
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::Write { subject, record } => {
                write_one(store.as_ref(), &subject, &record).await;
            }
            WriteJob::Flush { batch, done } => {
                let mut report = FlushReport::default();
                for (subject, record) in &batch {
                    if write_one(store.as_ref(), subject, record).await {
                        report.written += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                if !batch.is_empty() {
                    info!(written = report.written, failed = report.failed, "Flushed pending writes");
                }
                let _ = done.send(report);
            }
        }
    }
    debug!("Persistence writer stopped");
}

async fn write_one(store: &dyn RecordStore, subject: &SubjectId, record: &PersistedRecord) -> bool {
    match store.upsert_merge(subject, record).await {
        Ok(()) => {
            info!(
                subject = %subject,
                total = %format_hms(record.total_seconds),
                "Saved voice data"
            );
            true
        }
        Err(e) => {
            // The ledger still holds the data; the next mutation retries.
            error!(subject = %subject, error = %e, "Failed to save voice data");
            false
        }
    }
}
