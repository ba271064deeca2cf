//! Core domain types: transaction events, accounts, ledger entries and the
//! request/response shapes of the intake operations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// User identifier, owner of exactly one account.
pub type UserId = String;

/// Client-supplied idempotency token identifying one transaction event.
pub type MessageId = String;

/// Ledger sequence number, assigned by the ledger store.
pub type LedgerId = u64;

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Adds funds (`load`).
    Credit,
    /// Removes funds (`authorize`).
    Debit,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Credit => f.write_str("CREDIT"),
            TransactionType::Debit => f.write_str("DEBIT"),
        }
    }
}

/// Lifecycle of a [`TransactionEvent`].
///
/// ```text
/// PENDING ──reconcile──► PROCESSED
/// FAILED   (terminal, set at creation)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    /// Accepted, not yet applied to ledger and account.
    Pending,
    /// Applied to ledger and account.
    Processed,
    /// Rejected for insufficient balance, kept as an audit record.
    Failed,
}

impl EventStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        matches!((self, next), (EventStatus::Pending, EventStatus::Processed))
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Pending => f.write_str("PENDING"),
            EventStatus::Processed => f.write_str("PROCESSED"),
            EventStatus::Failed => f.write_str("FAILED"),
        }
    }
}

/// Body of a `load` or `authorize` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub user_id: UserId,
    pub message_id: MessageId,
    pub amount: Amount,
    pub currency: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

/// An intended balance change, carrying the balance snapshot it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub message_id: MessageId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Requested amount.
    pub amount: Amount,
    /// Balance after applying this event (unchanged for FAILED debits).
    pub running_balance: Amount,
    pub currency: String,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
}

impl TransactionEvent {
    /// Build a new event from an already-validated request.
    pub fn new(request: &TransactionRequest, running_balance: Amount, status: EventStatus) -> Self {
        Self {
            message_id: request.message_id.clone(),
            user_id: request.user_id.clone(),
            kind: request.kind,
            amount: request.amount,
            running_balance,
            currency: request.currency.clone(),
            status,
            created_at: Utc::now(),
        }
    }
}

/// Materialized balance of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub balance: Amount,
}

impl Account {
    /// Provision an account with an opening balance.
    pub fn open(user_id: impl Into<UserId>, balance: Amount) -> Self {
        Self {
            user_id: user_id.into(),
            balance,
        }
    }
}

/// A ledger entry that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    /// Event this entry was derived from; at most one entry per event.
    pub message_id: MessageId,
    pub user_id: UserId,
    pub kind: TransactionType,
    pub amount: Amount,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    pub fn from_event(event: &TransactionEvent) -> Self {
        Self {
            message_id: event.message_id.clone(),
            user_id: event.user_id.clone(),
            kind: event.kind,
            amount: event.amount,
            currency: event.currency.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Immutable record of a processed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerId,
    pub message_id: MessageId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Amount,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn with_id(id: LedgerId, entry: NewLedgerEntry) -> Self {
        Self {
            id,
            message_id: entry.message_id,
            user_id: entry.user_id,
            kind: entry.kind,
            amount: entry.amount,
            currency: entry.currency,
            created_at: entry.created_at,
        }
    }
}

/// Outcome code attached to successful `authorize` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorizationStatus {
    Approved,
}

/// Response of `load` and `authorize`.
///
/// `amount` is the running balance after the operation, not the requested amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub user_id: UserId,
    pub message_id: MessageId,
    pub amount: Amount,
    pub currency: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_code: Option<AuthorizationStatus>,
}

impl TransactionResponse {
    pub fn from_event(event: &TransactionEvent) -> Self {
        Self {
            user_id: event.user_id.clone(),
            message_id: event.message_id.clone(),
            amount: event.running_balance,
            currency: event.currency.clone(),
            kind: event.kind,
            response_code: None,
        }
    }

    pub fn approved(mut self) -> Self {
        self.response_code = Some(AuthorizationStatus::Approved);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: TransactionType) -> TransactionRequest {
        TransactionRequest {
            user_id: "u1".to_string(),
            message_id: "m1".to_string(),
            amount: Amount::from_scaled(500_000),
            currency: "USD".to_string(),
            kind,
        }
    }

    #[test]
    fn only_pending_to_processed_is_legal() {
        use EventStatus::*;
        assert!(Pending.can_transition_to(Processed));

        assert!(!Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Processed.can_transition_to(Pending));
        assert!(!Processed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processed));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn event_copies_request_fields() {
        let req = request(TransactionType::Debit);
        let event = TransactionEvent::new(&req, Amount::from_scaled(100), EventStatus::Failed);

        assert_eq!(event.message_id, "m1");
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.kind, TransactionType::Debit);
        assert_eq!(event.amount, req.amount);
        assert_eq!(event.running_balance, Amount::from_scaled(100));
        assert_eq!(event.currency, "USD");
        assert_eq!(event.status, EventStatus::Failed);
    }

    #[test]
    fn ledger_entry_derives_from_event() {
        let event = TransactionEvent::new(
            &request(TransactionType::Credit),
            Amount::from_scaled(500_000),
            EventStatus::Pending,
        );
        let entry = LedgerEntry::with_id(7, NewLedgerEntry::from_event(&event));

        assert_eq!(entry.id, 7);
        assert_eq!(entry.message_id, event.message_id);
        assert_eq!(entry.user_id, event.user_id);
        assert_eq!(entry.amount, event.amount);
        assert_eq!(entry.kind, TransactionType::Credit);
    }

    #[test]
    fn response_echoes_running_balance() {
        let event = TransactionEvent::new(
            &request(TransactionType::Debit),
            Amount::from_scaled(20_000),
            EventStatus::Pending,
        );
        let response = TransactionResponse::from_event(&event).approved();

        assert_eq!(response.amount, Amount::from_scaled(20_000));
        assert_eq!(response.response_code, Some(AuthorizationStatus::Approved));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "DEBIT");
        assert_eq!(json["amount"], "2.0000");
        assert_eq!(json["response_code"], "APPROVED");
    }

    #[test]
    fn load_response_omits_response_code() {
        let event = TransactionEvent::new(
            &request(TransactionType::Credit),
            Amount::from_scaled(10_000),
            EventStatus::Pending,
        );
        let json = serde_json::to_value(TransactionResponse::from_event(&event)).unwrap();
        assert!(json.get("response_code").is_none());
    }
}
