use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use voxledger_core::AccountingRecord;

/// A full ledger snapshot, shared between subscribers.
pub type Snapshot = Arc<Vec<AccountingRecord>>;

/// Fan-out of ledger snapshots to live subscribers.
///
/// Sending never waits on a subscriber. A subscriber that falls behind skips
/// straight to the newest snapshot; one that went away is simply dropped.
pub struct LivePublisher {
    tx: broadcast::Sender<Snapshot>,
}

impl LivePublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Whether a broadcast would reach anyone; lets callers skip building
    /// snapshots nobody will read.
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Push `snapshot` to every subscriber. Returns how many were reached.
    pub fn broadcast(&self, snapshot: Vec<AccountingRecord>) -> usize {
        self.tx.send(Arc::new(snapshot)).unwrap_or(0)
    }

    /// Subscribe, handing back `baseline` as the first snapshot.
    pub fn subscribe(&self, baseline: Vec<AccountingRecord>) -> Subscription {
        Subscription {
            baseline: Some(Arc::new(baseline)),
            rx: self.tx.subscribe(),
        }
    }
}

/// A live feed of snapshots. Dropping it unsubscribes.
pub struct Subscription {
    baseline: Option<Snapshot>,
    rx: broadcast::Receiver<Snapshot>,
}

impl Subscription {
    /// Next snapshot to deliver, starting with the baseline.
    /// Returns `None` once the publisher is gone.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if let Some(baseline) = self.baseline.take() {
            return Some(baseline);
        }
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Subscriber lagged, skipping to newest snapshot");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxledger_core::Presentation;

    fn snapshot(n: u64) -> Vec<AccountingRecord> {
        let mut rec = AccountingRecord::new("1".into(), &Presentation::default());
        rec.total_seconds = n;
        vec![rec]
    }

    #[tokio::test]
    async fn test_baseline_then_updates() {
        let publisher = LivePublisher::new(8);
        let mut sub = publisher.subscribe(snapshot(0));
        assert_eq!(publisher.broadcast(snapshot(1)), 1);

        assert_eq!(sub.next().await.unwrap()[0].total_seconds, 0);
        assert_eq!(sub.next().await.unwrap()[0].total_seconds, 1);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_fine() {
        let publisher = LivePublisher::new(8);
        assert!(!publisher.has_subscribers());
        assert_eq!(publisher.broadcast(snapshot(1)), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_skips_ahead() {
        let publisher = LivePublisher::new(2);
        let mut slow = publisher.subscribe(Vec::new());
        for n in 0..10 {
            publisher.broadcast(snapshot(n));
        }
        assert!(slow.next().await.unwrap().is_empty());
        // Older snapshots were overwritten; the lagging reader resumes near the end.
        let next = slow.next().await.unwrap();
        assert!(next[0].total_seconds >= 8);
    }

    #[tokio::test]
    async fn test_closed_publisher_ends_subscription() {
        let publisher = LivePublisher::new(2);
        let mut sub = publisher.subscribe(Vec::new());
        drop(publisher);
        assert!(sub.next().await.is_some());
        assert!(sub.next().await.is_none());
    }
}
