//! Per-subject debounce timers for persistence.
//!
//! Each mutation re-arms its subject's timer; only the last timer to expire
//! within a burst produces a write. Timers are plain sleep tasks that report
//! back to the ledger actor over `expiry_tx`, so the actor stays the only
//! place that reads the ledger.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use voxledger_core::SubjectId;

/// Sent by a timer task when its delay has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub subject: SubjectId,
    pub generation: u64,
}

struct PendingWrite {
    generation: u64,
    timer: JoinHandle<()>,
}

pub struct DebounceCoordinator {
    delay: Duration,
    pending: HashMap<SubjectId, PendingWrite>,
    next_generation: u64,
    expiry_tx: mpsc::UnboundedSender<Expiry>,
}

impl DebounceCoordinator {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<Expiry>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            delay,
            pending: HashMap::new(),
            next_generation: 0,
            expiry_tx,
        };
        (coordinator, expiry_rx)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, subject: &SubjectId) -> bool {
        self.pending.contains_key(subject)
    }

    /// Arm or re-arm the timer for `subject`.
    pub fn schedule(&mut self, subject: &SubjectId) {
        self.next_generation += 1;
        let generation = self.next_generation;

        if let Some(previous) = self.pending.remove(subject) {
            previous.timer.abort();
            trace!(subject = %subject, "Coalesced pending write");
        }

        let tx = self.expiry_tx.clone();
        let delay = self.delay;
        let expiring = subject.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Expiry {
                subject: expiring,
                generation,
            });
        });

        self.pending
            .insert(subject.clone(), PendingWrite { generation, timer });
    }

    /// Accept an expiry if it belongs to the currently armed timer.
    ///
    /// A timer can fire just before it is aborted and re-armed; its stale
    /// expiry is rejected here so a burst still yields a single write.
    pub fn take_expired(&mut self, expiry: &Expiry) -> bool {
        match self.pending.get(&expiry.subject) {
            Some(p) if p.generation == expiry.generation => {
                self.pending.remove(&expiry.subject);
                true
            }
            _ => {
                debug!(subject = %expiry.subject, "Ignoring superseded timer");
                false
            }
        }
    }

    /// Cancel every timer and return the subjects that still owe a write.
    pub fn drain(&mut self) -> Vec<SubjectId> {
        let mut subjects: Vec<SubjectId> = self
            .pending
            .drain()
            .map(|(subject, pending)| {
                pending.timer.abort();
                subject
            })
            .collect();
        subjects.sort();
        subjects
    }
}

impl Drop for DebounceCoordinator {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rearm_yields_single_expiry() {
        let (mut debounce, mut rx) = DebounceCoordinator::new(Duration::from_secs(2));
        let id = SubjectId::new("1");

        debounce.schedule(&id);
        tokio::time::sleep(Duration::from_millis(100)).await;
        debounce.schedule(&id);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        debounce.schedule(&id);

        let expiry = rx.recv().await.unwrap();
        assert!(debounce.take_expired(&expiry));
        assert_eq!(debounce.pending_count(), 0);

        // No stragglers from the aborted timers.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_rejected() {
        let (mut debounce, _rx) = DebounceCoordinator::new(Duration::from_secs(2));
        let id = SubjectId::new("1");
        debounce.schedule(&id);
        debounce.schedule(&id);

        let stale = Expiry {
            subject: id.clone(),
            generation: 1,
        };
        assert!(!debounce.take_expired(&stale));
        assert!(debounce.is_pending(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_cancels_everything() {
        let (mut debounce, mut rx) = DebounceCoordinator::new(Duration::from_secs(2));
        debounce.schedule(&SubjectId::new("b"));
        debounce.schedule(&SubjectId::new("a"));

        let drained = debounce.drain();
        assert_eq!(drained, vec![SubjectId::new("a"), SubjectId::new("b")]);
        assert!(debounce.drain().is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
