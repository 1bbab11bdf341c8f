//! Suppression map for repeated writes to the same key.

use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Tracks the last emission time per key and suppresses emissions that
/// arrive within the debounce interval.
///
/// The map only grows between sweeps; [`DebounceMap::sweep`] evicts entries
/// older than twice the interval and runs on a longer cadence than the
/// interval itself.
pub struct DebounceMap<K: Eq + Hash> {
    entries: DashMap<K, Instant>,
    interval: Duration,
}

impl<K: Eq + Hash> DebounceMap<K> {
    /// Creates a map with the given debounce interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            interval,
        }
    }

    /// Returns `true` when the key has not been emitted within the
    /// interval, stamping it as emitted now.
    pub fn should_emit(&self, key: K) -> bool {
        let now = Instant::now();
        let mut emitted = false;
        self.entries
            .entry(key)
            .and_modify(|stamp| {
                if now.duration_since(*stamp) >= self.interval {
                    *stamp = now;
                    emitted = true;
                }
            })
            .or_insert_with(|| {
                emitted = true;
                now
            });
        emitted
    }

    /// Evicts entries older than twice the interval. Returns how many were
    /// removed.
    pub fn sweep(&self) -> usize {
        let cutoff = self.interval * 2;
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, stamp| now.duration_since(*stamp) < cutoff);
        before - self.entries.len()
    }

    /// Current number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
