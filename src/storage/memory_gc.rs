//! In-memory storage with idle-entry sweeping.
//!
//! This storage backend uses `DashMap` for concurrent access to the key
//! space and a `parking_lot` mutex per entry, so that one client's
//! read-decide-write never blocks another client's.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::duration_nanos;
use crate::error::{ConfigError, Result};
use crate::storage::entry::StoreEntry;

/// Default idle time after which an entry may be swept.
const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// When idle entries are swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepInterval {
    /// Sweep from a background task at a fixed period. Needs a Tokio runtime.
    Every(Duration),
    /// Sweep inline on every n-th decision.
    Requests(u64),
    /// Only sweep when asked to.
    Manual,
}

impl Default for SweepInterval {
    fn default() -> Self {
        Self::Requests(10_000)
    }
}

/// Sweeping configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// When to sweep.
    pub interval: SweepInterval,
    /// Idle time after which an entry is removed. `None` derives it from the
    /// algorithm's horizon: the larger of one hour and twice the horizon.
    pub retention: Option<Duration>,
}

impl SweepConfig {
    /// Sweep from a background task every `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: SweepInterval::Every(interval),
            ..Default::default()
        }
    }

    /// Sweep inline every `count` decisions.
    pub fn on_requests(count: u64) -> Self {
        Self {
            interval: SweepInterval::Requests(count),
            ..Default::default()
        }
    }

    /// Only sweep on explicit request.
    pub fn manual() -> Self {
        Self {
            interval: SweepInterval::Manual,
            ..Default::default()
        }
    }

    /// Set the idle retention.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Validate the interval and resolve the retention against `horizon`.
    pub fn resolve(&self, horizon: Duration) -> Result<Duration> {
        match self.interval {
            SweepInterval::Every(d) if d.is_zero() => {
                return Err(ConfigError::InvalidSweep("interval must be > 0".into()).into());
            }
            SweepInterval::Requests(0) => {
                return Err(ConfigError::InvalidSweep("request count must be > 0".into()).into());
            }
            _ => {}
        }

        match self.retention {
            Some(retention) if duration_nanos(retention).is_none() => Err(ConfigError::InvalidSweep(
                format!("retention {retention:?} exceeds the nanosecond clock range"),
            )
            .into()),
            Some(retention) if retention <= horizon => {
                Err(ConfigError::InvalidRetention { retention, horizon }.into())
            }
            Some(retention) => Ok(retention),
            None => Ok(DEFAULT_RETENTION.max(horizon.saturating_mul(2))),
        }
    }
}

type Slot<S> = Arc<Mutex<StoreEntry<S>>>;

/// In-memory per-client state store.
///
/// Every entry sits behind its own lock. The map's shard locks are only held
/// while looking up or inserting a slot, never while an algorithm runs.
/// Sweeping takes each entry's lock with `try_lock` and skips entries that
/// are in use, so it never delays a decision.
///
/// # Example
///
/// ```ignore
/// use ratelimit_engine::storage::{MemoryStorage, SweepInterval};
/// use std::time::Duration;
///
/// let storage = MemoryStorage::<u64>::new(SweepInterval::Manual, Duration::from_secs(60));
/// let count = storage.with_entry("client", now, || 0, |n| { *n += 1; *n });
/// storage.sweep_at(later);
/// ```
pub struct MemoryStorage<S> {
    data: DashMap<String, Slot<S>>,
    interval: SweepInterval,
    retention: Duration,
    request_count: AtomicU64,
    sweep_lock: Mutex<()>,
}

impl<S> std::fmt::Debug for MemoryStorage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.data.len())
            .field("interval", &self.interval)
            .field("retention", &self.retention)
            .finish()
    }
}

impl<S> Default for MemoryStorage<S> {
    fn default() -> Self {
        Self::new(SweepInterval::default(), DEFAULT_RETENTION)
    }
}

impl<S> MemoryStorage<S> {
    /// Create an empty store.
    pub fn new(interval: SweepInterval, retention: Duration) -> Self {
        Self {
            data: DashMap::new(),
            interval,
            retention,
            request_count: AtomicU64::new(0),
            sweep_lock: Mutex::new(()),
        }
    }

    /// Idle time after which an entry is removed.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Run `op` on the state of `key` with exclusive access to that entry.
    ///
    /// A missing entry is created from `init`. If the entry is evicted
    /// between lookup and locking, a fresh one is created instead, so a
    /// decision never operates on state that has left the store.
    pub fn with_entry<T>(
        &self,
        key: &str,
        now: u64,
        init: impl Fn() -> S,
        op: impl FnOnce(&mut S) -> T,
    ) -> T {
        let mut guard = loop {
            let guard = self.slot(key, now, &init).lock_arc();
            if !guard.evicted {
                break guard;
            }
            tracing::trace!(key, "entry evicted while waiting, retrying");
        };

        guard.touch(now);
        let out = op(&mut guard.state);
        drop(guard);

        self.maybe_sweep(now);
        out
    }

    /// Slot of `key`, inserted if missing. Shard locks are released on return.
    fn slot(&self, key: &str, now: u64, init: &impl Fn() -> S) -> Slot<S> {
        if let Some(slot) = self.data.get(key) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .data
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(StoreEntry::new(init(), now))));
        Arc::clone(slot.value())
    }

    /// Remove the entry of `key`. Returns whether it existed.
    ///
    /// Waits for an in-flight decision on the key to finish.
    pub fn remove(&self, key: &str) -> bool {
        match self.data.remove(key) {
            Some((_, slot)) => {
                slot.lock().evicted = true;
                true
            }
            None => false,
        }
    }

    /// Remove entries idle for longer than the retention, as seen at `now`.
    /// Returns the number of entries removed.
    pub fn sweep_at(&self, now: u64) -> usize {
        let retention = duration_nanos(self.retention).unwrap_or(u64::MAX);
        let mut removed = 0;

        self.data.retain(|_, slot| match slot.try_lock() {
            Some(mut entry) if entry.idle_for(now) > retention => {
                entry.evicted = true;
                removed += 1;
                false
            }
            // Busy entries are in use, hence not idle.
            _ => true,
        });

        tracing::debug!(removed, remaining = self.data.len(), "swept idle entries");
        removed
    }

    /// Sweep inline when the request-count trigger fires.
    fn maybe_sweep(&self, now: u64) {
        if let SweepInterval::Requests(threshold) = self.interval {
            let count = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % threshold == 0 {
                // A concurrent sweep covers this one.
                if let Some(_guard) = self.sweep_lock.try_lock() {
                    self.sweep_at(now);
                }
            }
        }
    }

    /// Get the number of entries currently stored.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear all entries and release the map's memory.
    pub fn clear(&self) {
        self.data.retain(|_, slot| {
            slot.lock().evicted = true;
            false
        });
        self.data.shrink_to_fit();
    }
}

impl<S: Clone> MemoryStorage<S> {
    /// Copy of the state of `key`, if present. Does not count as a use.
    pub fn peek(&self, key: &str) -> Option<S> {
        let slot = self.data.get(key).map(|slot| Arc::clone(slot.value()))?;
        let entry = slot.lock();
        (!entry.evicted).then(|| entry.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000_000;

    fn manual(retention_secs: u64) -> MemoryStorage<u64> {
        MemoryStorage::new(SweepInterval::Manual, Duration::from_secs(retention_secs))
    }

    fn bump(storage: &MemoryStorage<u64>, key: &str, now: u64) -> u64 {
        storage.with_entry(key, now, || 0, |n| {
            *n += 1;
            *n
        })
    }

    #[test]
    fn test_with_entry_creates_and_updates() {
        let storage = manual(60);
        assert_eq!(bump(&storage, "a", 0), 1);
        assert_eq!(bump(&storage, "a", 0), 2);
        assert_eq!(bump(&storage, "b", 0), 1);
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.peek("a"), Some(2));
        assert_eq!(storage.peek("missing"), None);
    }

    #[test]
    fn test_sweep_removes_only_idle_entries() {
        let storage = manual(10);
        bump(&storage, "old", 0);
        bump(&storage, "fresh", 5 * SEC);

        // Exactly at the retention boundary the entry is kept.
        assert_eq!(storage.sweep_at(10 * SEC), 0);
        assert_eq!(storage.sweep_at(10 * SEC + 1), 1);
        assert_eq!(storage.peek("old"), None);
        assert_eq!(storage.peek("fresh"), Some(1));
    }

    #[test]
    fn test_swept_key_starts_fresh() {
        let storage = manual(10);
        bump(&storage, "a", 0);
        bump(&storage, "a", 0);
        storage.sweep_at(20 * SEC);
        assert!(storage.is_empty());
        assert_eq!(bump(&storage, "a", 20 * SEC), 1);
    }

    #[test]
    fn test_sweep_skips_locked_entry() {
        let storage = manual(10);
        bump(&storage, "a", 0);

        storage.with_entry("a", 0, || 0, |_| {
            // A sweep running while the entry is held leaves it alone.
            assert_eq!(storage.sweep_at(100 * SEC), 0);
        });
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_backwards_clock_does_not_age_entry() {
        let storage = manual(10);
        bump(&storage, "a", 50 * SEC);
        bump(&storage, "a", 0);
        assert_eq!(storage.sweep_at(55 * SEC), 0);
    }

    #[test]
    fn test_remove() {
        let storage = manual(10);
        bump(&storage, "a", 0);
        assert!(storage.remove("a"));
        assert!(!storage.remove("a"));
        assert_eq!(bump(&storage, "a", 0), 1);

        storage.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_request_count_sweep() {
        let storage = MemoryStorage::new(SweepInterval::Requests(3), Duration::from_secs(1));
        bump(&storage, "stale", 0);
        bump(&storage, "a", 5 * SEC);
        assert_eq!(storage.len(), 2);

        // Third decision triggers the sweep.
        bump(&storage, "a", 5 * SEC);
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.peek("stale"), None);
    }

    #[test]
    fn test_concurrent_updates_are_serialised() {
        let storage = Arc::new(manual(60));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = Arc::clone(&storage);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        bump(&storage, "shared", 0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(storage.peek("shared"), Some(8000));
    }

    #[test]
    fn test_sweep_config_resolve() {
        let horizon = Duration::from_secs(60);
        assert_eq!(
            SweepConfig::default().resolve(horizon).unwrap(),
            Duration::from_secs(3600)
        );
        assert_eq!(
            SweepConfig::default().resolve(Duration::from_secs(7200)).unwrap(),
            Duration::from_secs(14_400)
        );
        assert_eq!(
            SweepConfig::manual()
                .with_retention(Duration::from_secs(61))
                .resolve(horizon)
                .unwrap(),
            Duration::from_secs(61)
        );

        let err = SweepConfig::manual()
            .with_retention(horizon)
            .resolve(horizon)
            .unwrap_err();
        assert!(err.is_config());
        assert!(SweepConfig::every(Duration::ZERO).resolve(horizon).is_err());
        assert!(SweepConfig::on_requests(0).resolve(horizon).is_err());
    }

    #[test]
    fn test_sweep_config_rejects_retention_beyond_clock_range() {
        let horizon = Duration::from_secs(60);
        let err = SweepConfig::manual()
            .with_retention(Duration::MAX)
            .resolve(horizon)
            .unwrap_err();
        assert!(err.is_config());
        assert!(
            SweepConfig::manual()
                .with_retention(Duration::from_nanos(u64::MAX))
                .resolve(horizon)
                .is_ok()
        );
    }

    #[test]
    fn test_clear_releases_entries() {
        let storage: MemoryStorage<u64> = MemoryStorage::new(SweepInterval::Manual, Duration::from_secs(10));
        for key in ["a", "b", "c"] {
            bump(&storage, key, 0);
        }
        storage.clear();
        assert!(storage.is_empty());
        assert_eq!(storage.peek("a"), None);

        assert_eq!(bump(&storage, "a", 1), 1);
    }
}
