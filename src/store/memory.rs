//! In-memory store implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AccountStore, EventStore, LedgerStore, StoreError};
use crate::Amount;
use crate::model::{
    Account, EventStatus, LedgerEntry, LedgerId, MessageId, NewLedgerEntry, TransactionEvent,
    UserId,
};

#[derive(Debug, Default)]
struct EventTable {
    /// Events in insertion order, which is also creation order.
    events: Vec<TransactionEvent>,
    by_key: HashMap<MessageId, usize>,
}

#[derive(Debug, Default)]
pub struct MemoryEventStore {
    table: RwLock<EventTable>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored event, in creation order.
    pub async fn all(&self) -> Vec<TransactionEvent> {
        self.table.read().await.events.clone()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: TransactionEvent) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        if table.by_key.contains_key(&event.message_id) {
            return Err(StoreError::DuplicateKey(event.message_id));
        }
        let idx = table.events.len();
        table.by_key.insert(event.message_id.clone(), idx);
        table.events.push(event);
        Ok(())
    }

    async fn find_by_key(&self, message_id: &str) -> Result<Option<TransactionEvent>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .by_key
            .get(message_id)
            .map(|&idx| table.events[idx].clone()))
    }

    async fn find_by_status(
        &self,
        status: EventStatus,
    ) -> Result<Vec<TransactionEvent>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .events
            .iter()
            .filter(|e| e.status == status)
            .cloned()
            .collect())
    }

    async fn latest_balance_for_user(&self, user_id: &str) -> Result<Option<Amount>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .events
            .iter()
            .rev()
            .find(|e| e.user_id == user_id)
            .map(|e| e.running_balance))
    }

    async fn update_status(
        &self,
        message_id: &str,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        let idx = *table
            .by_key
            .get(message_id)
            .ok_or_else(|| StoreError::NotFound(message_id.to_string()))?;

        let event = &mut table.events[idx];
        if event.status != from || !from.can_transition_to(to) {
            return Err(StoreError::Conflict {
                key: message_id.to_string(),
                expected: from,
                actual: event.status,
            });
        }
        event.status = to;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<UserId, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every account, sorted by user id.
    pub async fn all(&self) -> Vec<Account> {
        let mut accounts: Vec<_> = self.accounts.read().await.values().cloned().collect();
        accounts.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        accounts
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(user_id).cloned())
    }

    async fn save(&self, account: Account) -> Result<(), StoreError> {
        self.accounts
            .write()
            .await
            .insert(account.user_id.clone(), account);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LedgerTable {
    entries: Vec<LedgerEntry>,
    by_message: HashMap<MessageId, usize>,
}

#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    table: RwLock<LedgerTable>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let mut table = self.table.write().await;
        if table.by_message.contains_key(&entry.message_id) {
            return Err(StoreError::DuplicateKey(entry.message_id));
        }
        let idx = table.entries.len();
        let entry = LedgerEntry::with_id(idx as LedgerId + 1, entry);
        table.by_message.insert(entry.message_id.clone(), idx);
        table.entries.push(entry.clone());
        Ok(entry)
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .by_message
            .get(message_id)
            .map(|&idx| table.entries[idx].clone()))
    }
}

/// The three in-memory stores, shared between intake and reconciliation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStores {
    pub events: Arc<MemoryEventStore>,
    pub accounts: Arc<MemoryAccountStore>,
    pub ledger: Arc<MemoryLedgerStore>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }
}
