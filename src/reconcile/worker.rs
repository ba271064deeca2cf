//! Background worker driving the [`Reconciler`].
//!
//! Intake signals "work available" through a [`ReconcileTrigger`]. Signals are
//! coalesced in a capacity-1 channel: while one is queued, further signals are
//! no-ops, because the queued run will see every event persisted before it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::Reconciler;

/// Create a connected trigger/worker pair.
///
/// With `sweep_interval` set, the worker also runs periodically, which picks
/// up events left PENDING by an abandoned run.
pub fn channel(
    reconciler: Arc<Reconciler>,
    sweep_interval: Option<Duration>,
) -> (ReconcileTrigger, ReconcileWorker) {
    let (sender, receiver) = mpsc::channel(1);
    let worker = ReconcileWorker {
        reconciler,
        receiver,
        sweep_interval,
    };
    (ReconcileTrigger { sender }, worker)
}

/// Cheap, cloneable handle used to request a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileTrigger {
    sender: mpsc::Sender<()>,
}

impl ReconcileTrigger {
    /// Signal that PENDING events are available. Never blocks.
    pub fn notify(&self) {
        match self.sender.try_send(()) {
            Ok(()) => debug!("reconciliation requested"),
            Err(TrySendError::Full(())) => debug!("reconciliation already requested"),
            Err(TrySendError::Closed(())) => {
                warn!("reconciliation worker is not running, events stay pending")
            }
        }
    }
}

pub struct ReconcileWorker {
    reconciler: Arc<Reconciler>,
    receiver: mpsc::Receiver<()>,
    sweep_interval: Option<Duration>,
}

impl ReconcileWorker {
    /// Process signals until every [`ReconcileTrigger`] is dropped.
    pub async fn run(mut self) {
        let mut sweep = self.sweep_interval.map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!(sweep_ms = ?self.sweep_interval.map(|d| d.as_millis()), "reconciliation worker started");
        while self.next_wakeup(sweep.as_mut()).await {
            // failures are logged by the reconciler; events stay pending for the next wakeup
            let _ = self.reconciler.execute_with_retry().await;
        }
        info!("reconciliation worker stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Wait for a signal or a sweep tick. Returns false once the channel is closed.
    async fn next_wakeup(&mut self, sweep: Option<&mut Interval>) -> bool {
        match sweep {
            Some(ticker) => tokio::select! {
                signal = self.receiver.recv() => signal.is_some(),
                _ = ticker.tick() => true,
            },
            None => self.receiver.recv().await.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;
    use crate::model::{Account, EventStatus, TransactionEvent, TransactionRequest, TransactionType};
    use crate::reconcile::RetryPolicy;
    use crate::store::{AccountStore, EventStore, MemoryStores};

    fn reconciler(stores: &MemoryStores) -> Arc<Reconciler> {
        Arc::new(Reconciler::new(
            stores.events.clone(),
            stores.accounts.clone(),
            stores.ledger.clone(),
            RetryPolicy {
                max_attempts: 1,
                backoff: Duration::from_millis(1),
            },
        ))
    }

    async fn seed(stores: &MemoryStores, message: &str, balance: i64) {
        stores
            .accounts
            .save(Account::open("u1", Amount::ZERO))
            .await
            .unwrap();
        let request = TransactionRequest {
            user_id: "u1".to_string(),
            message_id: message.to_string(),
            amount: Amount::from_scaled(balance),
            currency: "USD".to_string(),
            kind: TransactionType::Credit,
        };
        stores
            .events
            .insert(TransactionEvent::new(
                &request,
                Amount::from_scaled(balance),
                EventStatus::Pending,
            ))
            .await
            .unwrap();
    }

    async fn wait_until_drained(stores: &MemoryStores) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let pending = stores
                    .events
                    .find_by_status(EventStatus::Pending)
                    .await
                    .unwrap();
                if pending.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pending events were not drained");
    }

    #[tokio::test]
    async fn notify_wakes_the_worker() {
        let stores = MemoryStores::new();
        let (trigger, worker) = channel(reconciler(&stores), None);
        let handle = worker.spawn();

        seed(&stores, "m1", 100).await;
        trigger.notify();
        wait_until_drained(&stores).await;

        assert_eq!(stores.ledger.len().await, 1);

        drop(trigger);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn repeated_notifications_coalesce() {
        let stores = MemoryStores::new();
        let (trigger, worker) = channel(reconciler(&stores), None);

        seed(&stores, "m1", 100).await;
        for _ in 0..10 {
            trigger.notify();
        }
        let handle = worker.spawn();
        wait_until_drained(&stores).await;

        drop(trigger);
        handle.await.unwrap();
        assert_eq!(stores.ledger.len().await, 1);
    }

    #[tokio::test]
    async fn worker_stops_when_triggers_are_dropped() {
        let stores = MemoryStores::new();
        let (trigger, worker) = channel(reconciler(&stores), None);
        let handle = worker.spawn();

        let clone = trigger.clone();
        drop(trigger);
        drop(clone);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn sweep_drains_without_notification() {
        let stores = MemoryStores::new();
        let (trigger, worker) = channel(reconciler(&stores), Some(Duration::from_millis(10)));
        let handle = worker.spawn();

        seed(&stores, "m1", 100).await;
        wait_until_drained(&stores).await;
        assert_eq!(stores.ledger.len().await, 1);

        drop(trigger);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn notify_without_worker_does_not_block() {
        let stores = MemoryStores::new();
        let (trigger, worker) = channel(reconciler(&stores), None);
        drop(worker);

        trigger.notify();
        trigger.notify();
    }
}
