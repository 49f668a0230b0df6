//! Per-card write locks.
//!
//! Every balance or status write takes the locks of the cards it touches
//! before opening its DB transaction. Locks are always taken in ascending id
//! order, so two transfers over the same pair can never deadlock.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct CardLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop.
#[derive(Debug)]
pub(crate) struct CardGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl CardLocks {
    pub(crate) async fn acquire(&self, ids: &[Uuid]) -> CardGuard {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the table holds these: nobody is waiting on them.
            slots.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            ids.iter()
                .map(|id| Arc::clone(slots.entry(*id).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        CardGuard { _guards: guards }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn overlapping_sets_are_serialized() {
        let locks = Arc::new(CardLocks::default());
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();

        let guard = locks.acquire(&[b, a]).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(&[a]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_ids_do_not_self_deadlock() {
        let locks = CardLocks::default();
        let a = Uuid::now_v7();
        let _guard = locks.acquire(&[a, a]).await;
    }

    #[tokio::test]
    async fn idle_slots_are_pruned() {
        let locks = CardLocks::default();
        for _ in 0..10 {
            let _guard = locks.acquire(&[Uuid::now_v7()]).await;
        }
        let _guard = locks.acquire(&[Uuid::now_v7()]).await;
        assert_eq!(locks.len(), 1);
    }
}
