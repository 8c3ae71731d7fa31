//! Non-reentrant per-feed run guard.
//!
//! # Invariants
//! - At most one guard per feed URL is alive across all clones of a
//!   `FeedRunLocks`.
//! - Dropping the guard releases the feed, including on early return.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared registry of feeds with a run in progress.
#[derive(Debug, Clone, Default)]
pub struct FeedRunLocks {
    active: Arc<Mutex<HashSet<String>>>,
}

impl FeedRunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `feed_url`, or returns `None` when a run already holds it.
    pub fn try_acquire(&self, feed_url: &str) -> Option<FeedRunGuard> {
        let inserted = lock(&self.active).insert(feed_url.to_string());
        inserted.then(|| FeedRunGuard {
            active: Arc::clone(&self.active),
            feed_url: feed_url.to_string(),
        })
    }

    pub fn is_running(&self, feed_url: &str) -> bool {
        lock(&self.active).contains(feed_url)
    }
}

/// Held for the duration of one feed run.
#[derive(Debug)]
pub struct FeedRunGuard {
    active: Arc<Mutex<HashSet<String>>>,
    feed_url: String,
}

impl Drop for FeedRunGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.feed_url);
    }
}

// The set stays consistent even if a holder panicked, so poisoning is ignored.
fn lock(active: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}
