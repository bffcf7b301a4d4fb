//! Per-key mutual exclusion with bounded waiting.
//!
//! Intake serializes work on one subject, and schedule updates on one
//! observer, without blocking unrelated keys. Every acquisition carries a
//! deadline; nothing here waits forever.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// A key stayed held past the caller's deadline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("timed out waiting for lock on {0}")]
pub struct LockTimeout(pub String);

#[derive(Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

/// A table of named locks, created on first use.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free or `deadline` passes.
    pub fn acquire(&self, key: &str, deadline: Instant) -> Result<KeyGuard<'_>, LockTimeout> {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let mut held = lock(&slot.held);
        while *held {
            let now = Instant::now();
            if now >= deadline {
                return Err(LockTimeout(key.to_string()));
            }
            held = slot
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *held = true;
        drop(held);

        Ok(KeyGuard {
            locks: self,
            key: key.to_string(),
            slot,
        })
    }

    fn release(&self, key: &str, slot: &Arc<Slot>) {
        *lock(&slot.held) = false;
        slot.released.notify_one();

        // Drop idle slots so the table does not grow with every key ever seen.
        let mut slots = lock(&self.slots);
        if Arc::strong_count(slot) == 2 && !*lock(&slot.held) {
            slots.remove(key);
        }
    }
}

/// Holds one key until dropped.
pub struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    slot: Arc<Slot>,
}

impl KeyGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.key, &self.slot);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
