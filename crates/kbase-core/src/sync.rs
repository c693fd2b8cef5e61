//! Concurrency helpers shared by the generator and the position manager.
//!
//! - [`KeyedLocks`]: one async mutex per key, created on demand
//! - [`with_timeout`]: bound an external call by an optional deadline

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::Result;

/// Idle entries are pruned once the table grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

/// A table of async mutexes keyed by `K`.
///
/// Holding the guard returned by [`lock`](Self::lock) serializes every other
/// caller using the same key; callers on different keys proceed in parallel.
pub struct KeyedLocks<K> {
    table: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            if table.len() > PRUNE_THRESHOLD {
                table.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(table.entry(key.clone()).or_default())
        };
        entry.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `future`, failing with `on_timeout()` if `timeout` elapses first.
///
/// `None` means no deadline.
pub async fn with_timeout<T, F, E>(timeout: Option<Duration>, future: F, on_timeout: E) -> Result<T>
where
    F: Future<Output = Result<T>>,
    E: FnOnce() -> crate::Error,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout()),
        },
        None => future.await,
    }
}
