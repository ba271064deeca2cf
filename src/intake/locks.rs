use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::UserId;

/// One async lock per user, serializing the read-compute-insert window of intake.
///
/// Locks are created on first use and kept for the life of the service.
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            match locks.get(user_id) {
                Some(lock) => lock.clone(),
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    locks.insert(user_id.to_string(), lock.clone());
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_user_is_exclusive() {
        let locks = UserLocks::new();
        let _held = locks.lock("u1").await;

        let second = tokio::time::timeout(Duration::from_millis(20), locks.lock("u1")).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn different_users_do_not_block() {
        let locks = UserLocks::new();
        let _u1 = locks.lock("u1").await;

        let u2 = tokio::time::timeout(Duration::from_millis(20), locks.lock("u2")).await;
        assert!(u2.is_ok());
    }

    #[tokio::test]
    async fn released_lock_can_be_taken_again() {
        let locks = UserLocks::new();
        drop(locks.lock("u1").await);
        let _again = locks.lock("u1").await;
    }
}
