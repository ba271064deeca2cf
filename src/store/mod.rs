//! Storage collaborators used by intake and reconciliation.
//!
//! The traits describe only what the core needs. [`memory`] provides the
//! implementations used by the CLI and the tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::Amount;
use crate::model::{Account, EventStatus, LedgerEntry, NewLedgerEntry, TransactionEvent};

pub mod memory;
pub use memory::{MemoryAccountStore, MemoryEventStore, MemoryLedgerStore, MemoryStores};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("key {0} already exists")]
    DuplicateKey(String),

    #[error("key {0} not found")]
    NotFound(String),

    #[error("{key}: expected status {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: EventStatus,
        actual: EventStatus,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether repeating the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Append-only storage of transaction events, keyed by message id.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new event. Fails with [`StoreError::DuplicateKey`] if the
    /// message id is taken; existing events are never overwritten.
    async fn insert(&self, event: TransactionEvent) -> Result<(), StoreError>;

    async fn find_by_key(&self, message_id: &str) -> Result<Option<TransactionEvent>, StoreError>;

    /// All events with the given status, in creation order.
    async fn find_by_status(&self, status: EventStatus)
    -> Result<Vec<TransactionEvent>, StoreError>;

    /// Running balance of the most recently created event for the user,
    /// whatever its status.
    async fn latest_balance_for_user(&self, user_id: &str) -> Result<Option<Amount>, StoreError>;

    /// Compare-and-set the status of an event. Fails with
    /// [`StoreError::Conflict`] when the current status is not `from`.
    async fn update_status(
        &self,
        message_id: &str,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<(), StoreError>;
}

/// Current balance per user.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Account>, StoreError>;

    /// Insert or replace the account.
    async fn save(&self, account: Account) -> Result<(), StoreError>;
}

/// Append-only storage of processed transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append an entry and assign its id. Fails with
    /// [`StoreError::DuplicateKey`] if an entry for the same event exists.
    async fn insert(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn find_by_message_id(&self, message_id: &str)
    -> Result<Option<LedgerEntry>, StoreError>;
}
