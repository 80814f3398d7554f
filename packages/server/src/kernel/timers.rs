//! Keyed one-shot timers.
//!
//! Each key holds at most one pending timer. Arming a key again replaces the
//! previous timer; cancelling aborts it. Cancellation can still race with a
//! timer that has already woken up, so fire handlers must re-check whatever
//! condition they act on.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::debug;

pub struct TimerRegistry<K> {
    timers: Mutex<HashMap<K, (u64, AbortHandle)>>,
    next_generation: AtomicU64,
}

impl<K> Default for TimerRegistry<K>
where
    K: Copy + Eq + Hash + std::fmt::Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimerRegistry<K>
where
    K: Copy + Eq + Hash + std::fmt::Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<K, (u64, AbortHandle)>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `task` after `delay` unless `key` is cancelled or re-armed first.
    pub fn arm<F>(self: &Arc<Self>, key: K, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(self);

        // Hold the lock across spawn so the task cannot release its slot before it is recorded.
        let mut timers = self.timers();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.release(key, generation);
            task.await;
        });

        if let Some((_, previous)) = timers.insert(key, (generation, handle.abort_handle())) {
            debug!(?key, "Replacing armed timer");
            previous.abort();
        }
    }

    /// Abort the pending timer for `key`. Returns whether one was armed.
    pub fn cancel(&self, key: K) -> bool {
        match self.timers().remove(&key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, key: K) -> bool {
        self.timers().contains_key(&key)
    }

    pub fn armed_count(&self) -> usize {
        self.timers().len()
    }

    fn release(&self, key: K, generation: u64) {
        let mut timers = self.timers();
        if timers.get(&key).is_some_and(|(armed, _)| *armed == generation) {
            timers.remove(&key);
        }
    }
}
