//! Reconciliation of pending events into ledger and account state.
//!
//! [`Reconciler::execute`] drains every PENDING event under a job-wide lock:
//! for each event it appends the ledger entry, sets the account balance to the
//! event's running balance, and marks the event PROCESSED. The three writes are
//! individually idempotent (ledger keyed by message id, absolute balance,
//! compare-and-set status), so a retry after partial progress picks up the
//! remaining PENDING events without double-applying anything.
//!
//! [`worker`] drives the reconciler from intake signals and an optional sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::model::{EventStatus, NewLedgerEntry, TransactionEvent};
use crate::store::{AccountStore, EventStore, LedgerStore, StoreError};

mod error;
pub use error::ReconcileError;

pub mod worker;
pub use worker::{ReconcileTrigger, ReconcileWorker, channel};

/// Retry behaviour of [`Reconciler::execute_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(2000),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Events moved from PENDING to PROCESSED.
    pub processed: usize,
}

pub struct Reconciler {
    events: Arc<dyn EventStore>,
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerStore>,
    policy: RetryPolicy,
    /// Held for a whole run; tokio's mutex is FIFO so repeated triggers queue fairly.
    job_lock: Mutex<()>,
}

/// Public API
impl Reconciler {
    pub fn new(
        events: Arc<dyn EventStore>,
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn LedgerStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            events,
            accounts,
            ledger,
            policy,
            job_lock: Mutex::new(()),
        }
    }

    /// Drain all PENDING events once, in creation order.
    pub async fn execute(&self) -> Result<ReconcileReport, ReconcileError> {
        let _job = self.job_lock.lock().await;

        // store order is creation order; wall-clock timestamps are not trusted for it
        let pending = self.events.find_by_status(EventStatus::Pending).await?;

        let mut report = ReconcileReport::default();
        for event in &pending {
            if let Err(e) = self.apply_event(event).await {
                error!(
                    user = %event.user_id,
                    message = %event.message_id,
                    processed = report.processed,
                    reason = %e,
                    "reconciliation run failed"
                );
                return Err(e);
            }
            report.processed += 1;
        }

        if report.processed > 0 {
            info!(processed = report.processed, "reconciliation run complete");
        }
        Ok(report)
    }

    /// Run [`execute`](Self::execute) until it succeeds, a fatal error occurs,
    /// or the attempts of the retry policy are exhausted.
    pub async fn execute_with_retry(&self) -> Result<ReconcileReport, ReconcileError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.execute().await {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        backoff = ?self.policy.backoff,
                        reason = %e,
                        "reconciliation attempt failed, retrying"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        attempt,
                        max_attempts,
                        reason = %e,
                        "reconciliation abandoned, pending events left for the next trigger"
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Private API
impl Reconciler {
    /// Apply one event:
    /// - Resolve the account (nothing is written when it is missing)
    /// - Append its ledger entry (an existing entry from an interrupted run is kept)
    /// - Set the account balance to the event's running balance
    /// - Mark the event PROCESSED
    async fn apply_event(&self, event: &TransactionEvent) -> Result<(), ReconcileError> {
        let mut account = self
            .accounts
            .find_by_user_id(&event.user_id)
            .await?
            .ok_or_else(|| ReconcileError::AccountNotFound {
                user_id: event.user_id.clone(),
                message_id: event.message_id.clone(),
            })?;

        match self.ledger.insert(NewLedgerEntry::from_event(event)).await {
            Ok(entry) => {
                debug!(message = %event.message_id, ledger_id = entry.id, "ledger entry written");
            }
            Err(StoreError::DuplicateKey(_)) => {
                debug!(message = %event.message_id, "ledger entry already written");
            }
            Err(e) => return Err(e.into()),
        }

        account.balance = event.running_balance;
        self.accounts.save(account).await?;

        self.events
            .update_status(
                &event.message_id,
                EventStatus::Pending,
                EventStatus::Processed,
            )
            .await?;

        debug!(
            user = %event.user_id,
            message = %event.message_id,
            balance = %event.running_balance,
            "event processed"
        );
        Ok(())
    }
}
