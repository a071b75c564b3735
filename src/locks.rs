//! Per-key async mutex arena.
//!
//! Lookups that must not run twice for the same key (plot fetches, for
//! instance) take a guard from [`KeyedLocks`]. Entries are created on first
//! use and dropped by [`KeyedLocks::prune`] once nobody holds or waits on
//! them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Entry count past which [`KeyedLocks::lock`] prunes idle entries.
pub const DEFAULT_PRUNE_THRESHOLD: usize = 1024;

pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
    prune_threshold: usize,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::with_prune_threshold(DEFAULT_PRUNE_THRESHOLD)
    }

    pub fn with_prune_threshold(prune_threshold: usize) -> Self {
        Self {
            locks: DashMap::new(),
            prune_threshold,
        }
    }

    /// Acquire the lock for `key`, waiting for any current holder.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        if self.locks.len() > self.prune_threshold {
            self.prune();
        }

        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop entries that are neither held nor awaited.
    ///
    /// An entry whose only strong reference is the map's own is idle. Returns
    /// the number of entries removed.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        let removed = before.saturating_sub(self.locks.len());
        if removed > 0 {
            debug!(removed, remaining = self.locks.len(), "Pruned idle key locks");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new()
    }
}
