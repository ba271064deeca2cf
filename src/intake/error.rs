//! Error types for intake operations.

use thiserror::Error;

use crate::Amount;
use crate::balance::BalanceError;
use crate::model::{MessageId, TransactionType, UserId};
use crate::store::StoreError;

/// Error returned by [`IntakeService::load`](super::IntakeService::load) and
/// [`IntakeService::authorize`](super::IntakeService::authorize).
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("message ids do not match: path {path}, body {body}")]
    MessageIdMismatch { path: MessageId, body: MessageId },

    #[error("duplicate message id {0}")]
    DuplicateMessageId(MessageId),

    #[error("request type must be {expected}, got {actual}")]
    WrongType {
        expected: TransactionType,
        actual: TransactionType,
    },

    #[error("user not found for user id {0}")]
    AccountNotFound(UserId),

    #[error("account already exists for user id {0}")]
    AccountExists(UserId),

    #[error("insufficient balance for user {user_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        user_id: UserId,
        available: Amount,
        requested: Amount,
    },

    #[error("{0}")]
    Balance(#[from] BalanceError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl IntakeError {
    /// HTTP-style status code for the transport layer: 400 for anything the
    /// client can fix, 500 for store faults.
    pub fn status_code(&self) -> u16 {
        match self {
            IntakeError::Store(_) => 500,
            _ => 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_client_errors() {
        let errors = [
            IntakeError::MessageIdMismatch {
                path: "a".to_string(),
                body: "b".to_string(),
            },
            IntakeError::DuplicateMessageId("m1".to_string()),
            IntakeError::WrongType {
                expected: TransactionType::Credit,
                actual: TransactionType::Debit,
            },
            IntakeError::AccountNotFound("u1".to_string()),
            IntakeError::AccountExists("u1".to_string()),
            IntakeError::InsufficientBalance {
                user_id: "u1".to_string(),
                available: Amount::ZERO,
                requested: Amount::from_scaled(1),
            },
            IntakeError::Balance(BalanceError::Overflow(Amount::ZERO, Amount::ZERO)),
        ];
        for e in errors {
            assert_eq!(e.status_code(), 400, "{e}");
        }
    }

    #[test]
    fn store_faults_are_server_errors() {
        let e = IntakeError::Store(StoreError::Unavailable("down".to_string()));
        assert_eq!(e.status_code(), 500);
    }

    #[test]
    fn messages() {
        let e = IntakeError::WrongType {
            expected: TransactionType::Credit,
            actual: TransactionType::Debit,
        };
        assert_eq!(e.to_string(), "request type must be CREDIT, got DEBIT");

        let e = IntakeError::InsufficientBalance {
            user_id: "u1".to_string(),
            available: Amount::from_scaled(500_000),
            requested: Amount::from_scaled(5_000_000),
        };
        assert_eq!(
            e.to_string(),
            "insufficient balance for user u1: available 50.0000, requested 500.0000"
        );
    }
}
