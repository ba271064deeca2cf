//! Event intake: the `load` and `authorize` operations, plus account opening.
//!
//! Intake validates a request, derives the new running balance from the
//! latest event of the user, persists one event and signals reconciliation.
//! It never touches ledger state and only creates accounts, at zero; the
//! caller gets its response before reconciliation has run.

use std::sync::Arc;

use tracing::{info, warn};

use crate::Amount;
use crate::balance::{assess_debit, compute_next_balance};
use crate::model::{
    Account, EventStatus, MessageId, TransactionEvent, TransactionRequest, TransactionResponse,
    TransactionType,
};
use crate::reconcile::ReconcileTrigger;
use crate::store::{AccountStore, EventStore, StoreError};

mod error;
pub use error::IntakeError;

mod locks;
pub use locks::UserLocks;

pub struct IntakeService {
    events: Arc<dyn EventStore>,
    accounts: Arc<dyn AccountStore>,
    trigger: ReconcileTrigger,
    user_locks: UserLocks,
}

/// Public API
impl IntakeService {
    pub fn new(
        events: Arc<dyn EventStore>,
        accounts: Arc<dyn AccountStore>,
        trigger: ReconcileTrigger,
    ) -> Self {
        Self {
            events,
            accounts,
            trigger,
            user_locks: UserLocks::new(),
        }
    }

    /// Credit `request.amount` to the user.
    pub async fn load(
        &self,
        request: TransactionRequest,
        path_message_id: &str,
    ) -> Result<TransactionResponse, IntakeError> {
        let result = self.apply_load(&request, path_message_id).await;
        Self::log_result("load", &request, &result);
        result
    }

    /// Provision an account for a user that has none.
    ///
    /// The account is created at zero. A non-zero opening balance becomes a
    /// PENDING credit event with message id `open-{user_id}`, so later requests
    /// spend it and reconciliation brings the account up to it.
    pub async fn open(
        &self,
        user_id: &str,
        opening_balance: Amount,
        currency: &str,
    ) -> Result<Option<TransactionResponse>, IntakeError> {
        let result = self.apply_open(user_id, opening_balance, currency).await;
        match &result {
            Ok(_) => info!(user = %user_id, balance = %opening_balance, "open accepted"),
            Err(e) => info!(user = %user_id, reason = %e, "open rejected"),
        }
        result
    }

    /// Debit `request.amount` from the user if the balance covers it.
    ///
    /// An uncovered debit is still recorded, as a FAILED event.
    pub async fn authorize(
        &self,
        request: TransactionRequest,
        path_message_id: &str,
    ) -> Result<TransactionResponse, IntakeError> {
        let result = self.apply_authorize(&request, path_message_id).await;
        Self::log_result("authorize", &request, &result);
        result
    }
}

/// Private API
impl IntakeService {
    fn log_result(
        operation: &str,
        request: &TransactionRequest,
        result: &Result<TransactionResponse, IntakeError>,
    ) {
        match result {
            Ok(response) => {
                info!(
                    user = %request.user_id,
                    message = %request.message_id,
                    amount = %request.amount,
                    balance = %response.amount,
                    "{operation} accepted"
                );
            }
            Err(e @ IntakeError::Store(_)) => {
                warn!(
                    user = %request.user_id,
                    message = %request.message_id,
                    reason = %e,
                    "{operation} failed"
                );
            }
            Err(e) => {
                info!(
                    user = %request.user_id,
                    message = %request.message_id,
                    amount = %request.amount,
                    reason = %e,
                    "{operation} rejected"
                );
            }
        }
    }

    /// Checks shared by both operations; nothing is written when one fails.
    /// - Path and body message ids agree
    /// - Message id was never used
    /// - Request direction matches the operation
    /// - Account exists
    async fn validate(
        &self,
        request: &TransactionRequest,
        path_message_id: &str,
        expected: TransactionType,
    ) -> Result<(), IntakeError> {
        if request.message_id != path_message_id {
            return Err(IntakeError::MessageIdMismatch {
                path: path_message_id.to_string(),
                body: request.message_id.clone(),
            });
        }

        if self.events.find_by_key(&request.message_id).await?.is_some() {
            return Err(IntakeError::DuplicateMessageId(request.message_id.clone()));
        }

        if request.kind != expected {
            return Err(IntakeError::WrongType {
                expected,
                actual: request.kind,
            });
        }

        if self
            .accounts
            .find_by_user_id(&request.user_id)
            .await?
            .is_none()
        {
            return Err(IntakeError::AccountNotFound(request.user_id.clone()));
        }

        Ok(())
    }

    /// Latest running balance of the user, zero before the first event.
    async fn current_balance(&self, user_id: &str) -> Result<Amount, IntakeError> {
        Ok(self
            .events
            .latest_balance_for_user(user_id)
            .await?
            .unwrap_or_default())
    }

    async fn persist(&self, event: &TransactionEvent) -> Result<(), IntakeError> {
        match self.events.insert(event.clone()).await {
            Ok(()) => Ok(()),
            // lost a race against a concurrent request with the same id
            Err(StoreError::DuplicateKey(id)) => Err(IntakeError::DuplicateMessageId(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_open(
        &self,
        user_id: &str,
        opening_balance: Amount,
        currency: &str,
    ) -> Result<Option<TransactionResponse>, IntakeError> {
        let request = (opening_balance > Amount::ZERO).then(|| TransactionRequest {
            user_id: user_id.to_string(),
            message_id: opening_message_id(user_id),
            amount: opening_balance,
            currency: currency.to_string(),
            kind: TransactionType::Credit,
        });

        let event = {
            let _user = self.user_locks.lock(user_id).await;
            if self.accounts.find_by_user_id(user_id).await?.is_some() {
                return Err(IntakeError::AccountExists(user_id.to_string()));
            }
            if let Some(request) = &request {
                if self.events.find_by_key(&request.message_id).await?.is_some() {
                    return Err(IntakeError::DuplicateMessageId(request.message_id.clone()));
                }
            }

            self.accounts
                .save(Account::open(user_id, Amount::ZERO))
                .await?;

            match &request {
                Some(request) => {
                    let current = self.current_balance(user_id).await?;
                    let balance = compute_next_balance(
                        current,
                        TransactionType::Credit,
                        request.amount,
                        EventStatus::Pending,
                    )?;
                    let event = TransactionEvent::new(request, balance, EventStatus::Pending);
                    self.persist(&event).await?;
                    Some(event)
                }
                None => None,
            }
        };

        Ok(event.map(|event| {
            self.trigger.notify();
            TransactionResponse::from_event(&event)
        }))
    }

    async fn apply_load(
        &self,
        request: &TransactionRequest,
        path_message_id: &str,
    ) -> Result<TransactionResponse, IntakeError> {
        self.validate(request, path_message_id, TransactionType::Credit)
            .await?;

        let event = {
            let _user = self.user_locks.lock(&request.user_id).await;
            let current = self.current_balance(&request.user_id).await?;
            let balance = compute_next_balance(
                current,
                TransactionType::Credit,
                request.amount,
                EventStatus::Pending,
            )?;
            let event = TransactionEvent::new(request, balance, EventStatus::Pending);
            self.persist(&event).await?;
            event
        };

        self.trigger.notify();
        Ok(TransactionResponse::from_event(&event))
    }

    async fn apply_authorize(
        &self,
        request: &TransactionRequest,
        path_message_id: &str,
    ) -> Result<TransactionResponse, IntakeError> {
        self.validate(request, path_message_id, TransactionType::Debit)
            .await?;

        let (event, current) = {
            let _user = self.user_locks.lock(&request.user_id).await;
            let current = self.current_balance(&request.user_id).await?;
            let status = assess_debit(current, request.amount);
            let balance =
                compute_next_balance(current, TransactionType::Debit, request.amount, status)?;
            let event = TransactionEvent::new(request, balance, status);
            self.persist(&event).await?;
            (event, current)
        };

        if event.status == EventStatus::Failed {
            return Err(IntakeError::InsufficientBalance {
                user_id: request.user_id.clone(),
                available: current,
                requested: request.amount,
            });
        }

        self.trigger.notify();
        Ok(TransactionResponse::from_event(&event).approved())
    }
}

fn opening_message_id(user_id: &str) -> MessageId {
    format!("open-{user_id}")
}
