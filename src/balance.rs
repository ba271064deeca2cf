//! Balance computation for new transaction events.
//!
//! Everything here is pure: callers read the current balance, decide the
//! event status and persist the result themselves.

use thiserror::Error;

use crate::Amount;
use crate::model::{EventStatus, TransactionType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("balance overflow: {0} + {1}")]
    Overflow(Amount, Amount),
    #[error("balance underflow: {0} - {1}")]
    Underflow(Amount, Amount),
}

/// Compute the running balance an event will carry.
///
/// - Credits are always applied.
/// - Debits are applied when recorded as PENDING; a FAILED debit leaves the
///   balance unchanged.
pub fn compute_next_balance(
    current: Amount,
    kind: TransactionType,
    requested: Amount,
    status: EventStatus,
) -> Result<Amount, BalanceError> {
    match (kind, status) {
        (TransactionType::Credit, _) => current
            .checked_add(requested)
            .ok_or(BalanceError::Overflow(current, requested)),
        (TransactionType::Debit, EventStatus::Failed) => Ok(current),
        (TransactionType::Debit, _) => current
            .checked_sub(requested)
            .ok_or(BalanceError::Underflow(current, requested)),
    }
}

/// Status a debit of `requested` against `current` should be recorded with.
pub fn assess_debit(current: Amount, requested: Amount) -> EventStatus {
    if current < requested {
        EventStatus::Failed
    } else {
        EventStatus::Pending
    }
}
