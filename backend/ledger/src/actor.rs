//! The ledger actor: single owner of all accounting state.
//!
//! Presence events, ticker firings, debounce expiries and queries are all
//! handled one at a time by one task. Nothing outside this task touches the
//! [`Ledger`]; callers talk to it through a [`LedgerHandle`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use voxledger_core::{
    AccountingRecord, Clock, LedgerError, PresenceEvent, Presentation, RecordStore, SubjectId,
};

use crate::accrual;
use crate::debounce::{DebounceCoordinator, Expiry};
use crate::ledger::Ledger;
use crate::publisher::{LivePublisher, Subscription};
use crate::query::VoiceTimeReport;
use crate::reconcile::reconcile;
use crate::transition;
use crate::writer::{FlushReport, PersistenceWriter};

/// Tuning for the ledger actor.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Delay between a mutation and its persisted write.
    pub debounce: Duration,
    pub tick_interval: Duration,
    pub ticker_enabled: bool,
    /// Snapshots buffered per subscriber before it starts skipping.
    pub broadcast_capacity: usize,
    pub command_buffer: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            tick_interval: Duration::from_secs(1),
            ticker_enabled: true,
            broadcast_capacity: 64,
            command_buffer: 1024,
        }
    }
}

enum LedgerCommand {
    Ingest(PresenceEvent),
    Lookup {
        subject: SubjectId,
        resp: oneshot::Sender<Option<AccountingRecord>>,
    },
    Seed {
        record: AccountingRecord,
        resp: oneshot::Sender<AccountingRecord>,
    },
    QueryAll {
        resp: oneshot::Sender<Vec<AccountingRecord>>,
    },
    Subscribe {
        resp: oneshot::Sender<Subscription>,
    },
    FlushAll {
        resp: oneshot::Sender<FlushReport>,
    },
    Shutdown {
        resp: oneshot::Sender<FlushReport>,
    },
}

/// Cloneable client for the ledger actor.
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<LedgerCommand>,
    store: Arc<dyn RecordStore>,
}

fn closed<T>(_: T) -> LedgerError {
    LedgerError::ActorClosed("ledger".into())
}

impl LedgerHandle {
    /// Queue a presence event. Events are applied in the order they are sent.
    pub async fn ingest(&self, event: PresenceEvent) -> Result<(), LedgerError> {
        self.tx
            .send(LedgerCommand::Ingest(event))
            .await
            .map_err(closed)
    }

    /// Voice time for `subject` on `day` (a `YYYY-MM-DD` key).
    ///
    /// A subject the ledger has not seen is looked up in the store and
    /// installed in the ledger. A subject unknown to the store as well gets
    /// a zero report and leaves the ledger untouched.
    pub async fn query_voice_time(
        &self,
        subject: &SubjectId,
        day: &str,
    ) -> Result<VoiceTimeReport, LedgerError> {
        let record = match self.lookup(subject).await? {
            Some(record) => record,
            None => {
                let cold = match self.store.read_one(subject).await {
                    Ok(Some(persisted)) => {
                        debug!(subject = %subject, "Loaded cold subject from store");
                        AccountingRecord::from_persisted(subject.clone(), persisted)
                    }
                    Ok(None) => {
                        let unknown = AccountingRecord::new(subject.clone(), &Presentation::default());
                        return Ok(VoiceTimeReport::from_record(&unknown, day));
                    }
                    Err(e) => {
                        error!(subject = %subject, error = %e, "Store lookup failed");
                        return Err(LedgerError::StoreUnavailable(e.to_string()));
                    }
                };
                self.seed(cold).await?
            }
        };
        Ok(VoiceTimeReport::from_record(&record, day))
    }

    /// All records known to the ledger, ordered by subject id.
    pub async fn query_all_records(&self) -> Result<Vec<AccountingRecord>, LedgerError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(LedgerCommand::QueryAll { resp })
            .await
            .map_err(closed)?;
        rx.await.map_err(closed)
    }

    /// Subscribe to live snapshots. The first snapshot is the current state.
    pub async fn subscribe(&self) -> Result<Subscription, LedgerError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(LedgerCommand::Subscribe { resp })
            .await
            .map_err(closed)?;
        rx.await.map_err(closed)
    }

    /// Cancel all debounce timers and write their records now.
    pub async fn flush_all(&self) -> Result<FlushReport, LedgerError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(LedgerCommand::FlushAll { resp })
            .await
            .map_err(closed)?;
        rx.await.map_err(closed)
    }

    /// Flush everything and stop the actor.
    pub async fn shutdown(&self) -> Result<FlushReport, LedgerError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(LedgerCommand::Shutdown { resp })
            .await
            .map_err(closed)?;
        rx.await.map_err(closed)
    }

    async fn lookup(&self, subject: &SubjectId) -> Result<Option<AccountingRecord>, LedgerError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(LedgerCommand::Lookup {
                subject: subject.clone(),
                resp,
            })
            .await
            .map_err(closed)?;
        rx.await.map_err(closed)
    }

    async fn seed(&self, record: AccountingRecord) -> Result<AccountingRecord, LedgerError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(LedgerCommand::Seed { record, resp })
            .await
            .map_err(closed)?;
        rx.await.map_err(closed)
    }
}

struct LedgerActor {
    ledger: Ledger,
    debounce: DebounceCoordinator,
    writer: PersistenceWriter,
    publisher: LivePublisher,
    /// Subjects with ticker credit that no write has carried yet.
    ticked: BTreeSet<SubjectId>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

/// Reconcile from `store` and start the actor.
pub async fn start(
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
) -> (LedgerHandle, JoinHandle<()>) {
    let ledger = reconcile(store.as_ref()).await;
    spawn(ledger, store, clock, config)
}

/// Start the actor over an already-built ledger.
pub fn spawn(
    ledger: Ledger,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
) -> (LedgerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
    let (debounce, expiry_rx) = DebounceCoordinator::new(config.debounce);
    let (writer, _writer_task) = PersistenceWriter::spawn(Arc::clone(&store));

    let actor = LedgerActor {
        ledger,
        debounce,
        writer,
        publisher: LivePublisher::new(config.broadcast_capacity),
        ticked: BTreeSet::new(),
        clock,
        config,
    };
    let task = tokio::spawn(actor.run(rx, expiry_rx));
    (LedgerHandle { tx, store }, task)
}

impl LedgerActor {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<LedgerCommand>,
        mut expiry_rx: mpsc::UnboundedReceiver<Expiry>,
    ) {
        info!(
            records = self.ledger.len(),
            debounce_ms = self.config.debounce.as_millis() as u64,
            tick_ms = self.config.tick_interval.as_millis() as u64,
            ticker = self.config.ticker_enabled,
            "Ledger actor started"
        );

        let mut ticker = time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(LedgerCommand::Shutdown { resp }) => {
                            let report = self.flush_all().await;
                            let _ = resp.send(report);
                            break;
                        }
                        Some(cmd) => self.handle(cmd).await,
                        None => {
                            warn!("All ledger handles dropped, flushing and stopping");
                            self.flush_all().await;
                            break;
                        }
                    }
                }
                Some(expiry) = expiry_rx.recv() => self.on_expiry(expiry),
                _ = ticker.tick(), if self.config.ticker_enabled => self.on_tick(),
            }
        }

        info!("Ledger actor stopped");
    }

    async fn handle(&mut self, cmd: LedgerCommand) {
        match cmd {
            LedgerCommand::Ingest(event) => self.on_event(event),
            LedgerCommand::Lookup { subject, resp } => {
                let _ = resp.send(self.ledger.peek(&subject).cloned());
            }
            LedgerCommand::Seed { record, resp } => {
                let _ = resp.send(self.ledger.seed_if_absent(record));
            }
            LedgerCommand::QueryAll { resp } => {
                let _ = resp.send(self.ledger.snapshot());
            }
            LedgerCommand::Subscribe { resp } => {
                let subscription = self.publisher.subscribe(self.ledger.snapshot());
                debug!(subscribers = self.publisher.subscriber_count(), "Live subscriber added");
                let _ = resp.send(subscription);
            }
            LedgerCommand::FlushAll { resp } => {
                let report = self.flush_all().await;
                let _ = resp.send(report);
            }
            LedgerCommand::Shutdown { resp } => {
                // Normally intercepted by the run loop.
                let _ = resp.send(self.flush_all().await);
            }
        }
    }

    fn on_event(&mut self, event: PresenceEvent) {
        let outcome = transition::apply(&mut self.ledger, &event);
        if outcome.needs_persist() {
            self.debounce.schedule(&event.subject_id);
            self.publish();
        }
    }

    fn on_expiry(&mut self, expiry: Expiry) {
        if !self.debounce.take_expired(&expiry) {
            return;
        }
        self.ticked.remove(&expiry.subject);
        match self.ledger.peek(&expiry.subject) {
            Some(record) => self
                .writer
                .submit(expiry.subject.clone(), record.to_persisted()),
            None => warn!(subject = %expiry.subject, "Debounced write for unknown subject"),
        }
    }

    fn on_tick(&mut self) {
        let report = accrual::tick(&mut self.ledger, self.clock.now());
        if !report.is_empty() {
            self.ticked
                .extend(report.credited.into_iter().map(|(subject, _)| subject));
            self.publish();
        }
    }

    fn publish(&self) {
        if self.publisher.has_subscribers() {
            self.publisher.broadcast(self.ledger.snapshot());
        }
    }

    async fn flush_all(&mut self) -> FlushReport {
        let mut owed: BTreeSet<SubjectId> = self.debounce.drain().into_iter().collect();
        owed.append(&mut self.ticked);

        let batch: Vec<_> = owed
            .into_iter()
            .filter_map(|subject| {
                let record = self.ledger.peek(&subject)?.to_persisted();
                Some((subject, record))
            })
            .collect();

        match self.writer.flush(batch).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Flush failed");
                FlushReport::default()
            }
        }
    }
}
