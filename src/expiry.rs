//! Bookkeeping for one-shot host expiry timers.
//!
//! Each host with a TTL gets one armed timer task. Re-arming a key cancels
//! the previous task before the new one is recorded, and every armed timer
//! carries a generation number so a stale task that somehow outlives its
//! cancellation cannot delete a record it no longer owns.

use std::collections::HashMap;

use tokio::task::JoinHandle;

#[derive(Debug)]
struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Timer table keyed by host name. Lives inside the store's write lock, so
/// arm/cancel/fire decisions are serialized with the mutations they guard.
#[derive(Debug, Default)]
pub(crate) struct ExpirySchedule {
    timers: HashMap<String, ArmedTimer>,
    next_generation: u64,
}

impl ExpirySchedule {
    /// Allocate the generation for a timer about to be spawned.
    pub(crate) fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Record a freshly spawned timer for `key`, aborting any previous one.
    pub(crate) fn arm(&mut self, key: String, generation: u64, handle: JoinHandle<()>) {
        if let Some(old) = self.timers.insert(key, ArmedTimer { generation, handle }) {
            old.handle.abort();
        }
    }

    /// Abort and forget the timer for `key`, if one is armed.
    pub(crate) fn cancel(&mut self, key: &str) -> bool {
        match self.timers.remove(key) {
            Some(old) => {
                old.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Called by a firing timer task. Returns true and retires the entry
    /// only when the task is still the current owner of `key`; a stale
    /// generation means the timer was superseded and must not act.
    pub(crate) fn complete(&mut self, key: &str, generation: u64) -> bool {
        match self.timers.get(key) {
            Some(armed) if armed.generation == generation => {
                self.timers.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Abort every armed timer.
    pub(crate) fn cancel_all(&mut self) {
        for (_, old) in self.timers.drain() {
            old.handle.abort();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }
}
