//! Per-key single-flight guards for find-or-create cache paths.
//!
//! The compiler's caches follow a find-then-create pattern: look a record up, and
//! if it is missing compute and save it. Two tasks racing through that sequence
//! for the same key would both miss and both create (duplicate blob uploads, lost
//! package memoization). [`KeyedLocks`] serializes work per key while leaving
//! unrelated keys fully concurrent.
//!
//! Guards are RAII: dropping a [`KeyGuard`] releases the key, and the bookkeeping
//! entry is pruned once no other task holds or waits on it.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::constants::default_lock_timeout;
use crate::core::TplError;

/// Map of key → async mutex, created on demand.
#[derive(Debug, Clone)]
pub struct KeyedLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    timeout: Duration,
}

/// Exclusive hold on one key. Released on drop.
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // The map and this guard each hold one reference; anything above that is a
        // waiter that still needs the mutex.
        self.locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}

impl KeyedLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Wait for exclusive access to `key`.
    ///
    /// # Errors
    ///
    /// [`TplError::LockTimeout`] if the key is not released within the configured timeout.
    pub async fn acquire(&self, key: impl Into<String>) -> Result<KeyGuard, TplError> {
        let key = key.into();
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("Timed out waiting for cache key '{}'", key);
                return Err(TplError::LockTimeout {
                    key,
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        tracing::trace!("Acquired cache key '{}'", key);
        Ok(KeyGuard {
            key,
            locks: Arc::clone(&self.locks),
            _guard: guard,
        })
    }

    /// Number of keys currently tracked (held or waited on).
    pub fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new(default_lock_timeout())
    }
}
