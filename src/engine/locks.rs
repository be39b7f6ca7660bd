//! Per-aggregate critical sections.
//!
//! Every coordinator operation locks the booking and driver it touches.
//! Keys are sorted and deduplicated before acquisition so two operations
//! over overlapping entities always contend in the same order.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Booking(Uuid),
    Driver(Uuid),
}

type Entries = Arc<DashMap<LockKey, Arc<Mutex<()>>>>;

/// Entries exist only while some operation holds or waits on them.
#[derive(Default)]
pub struct LockTable {
    entries: Entries,
}

/// Holds every lock of one aggregate; all are released on drop.
pub struct AggregateGuard {
    entries: Entries,
    keys: Vec<LockKey>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl AggregateGuard {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }

    pub fn covers(&self, key: LockKey) -> bool {
        self.keys.binary_search(&key).is_ok()
    }
}

impl Drop for AggregateGuard {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            // A waiter holds its own clone, so a count of one means nobody
            // else can still reach this mutex.
            self.entries
                .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn acquire<I>(&self, keys: I) -> AggregateGuard
    where
        I: IntoIterator<Item = LockKey>,
    {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        // Built up front so a cancelled acquisition still prunes its entries.
        let mut aggregate = AggregateGuard {
            entries: self.entries.clone(),
            guards: Vec::with_capacity(keys.len()),
            keys,
        };

        for i in 0..aggregate.keys.len() {
            // The map entry guard must be gone before we await the mutex.
            let mutex = self.entries.entry(aggregate.keys[i]).or_default().clone();
            aggregate.guards.push(mutex.lock_owned().await);
        }

        aggregate
    }
}
