//! Error types for reconciliation runs.

use thiserror::Error;

use crate::model::{MessageId, UserId};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("account for user {user_id} not found while applying {message_id}")]
    AccountNotFound {
        user_id: UserId,
        message_id: MessageId,
    },
}

impl ReconcileError {
    /// Whether another attempt of the whole run may succeed.
    ///
    /// Only transient store faults qualify. Missing accounts need provisioning
    /// and status conflicts mean another writer touched the event.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Store(e) => e.is_transient(),
            ReconcileError::AccountNotFound { .. } => false,
        }
    }
}
